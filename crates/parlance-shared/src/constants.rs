/// Application name
pub const APP_NAME: &str = "Parlance";

/// Top-level collection holding user profiles
pub const USERS: &str = "users";

/// Top-level collection holding chat rooms
pub const CHAT_ROOMS: &str = "chatRooms";

/// Subcollection of a chat room holding its messages
pub const MESSAGES: &str = "messages";

/// Subcollection of a user holding their block list
pub const BLOCKED: &str = "blocked";

/// Top-level collection holding topic group chats
pub const GROUP_CHATS: &str = "groupChats";

/// Sender id of messages posted by the app itself
pub const SYSTEM_SENDER: &str = "system";

/// Display name of messages posted by the app itself
pub const SYSTEM_SENDER_NAME: &str = "System";

/// Top-level collection of abuse reports
pub const REPORTS: &str = "reports";

/// Top-level collection of daily mission progress
pub const USER_MISSIONS: &str = "userMissions";

/// Attempts made when loading a profile right after signup
pub const PROFILE_LOAD_ATTEMPTS: u32 = 3;

/// Delay between profile load attempts in milliseconds
pub const PROFILE_RETRY_DELAY_MS: u64 = 500;

/// Primary translation endpoint (Google Translate, gtx client)
pub const GOOGLE_TRANSLATE_URL: &str = "https://translate.googleapis.com";

/// Secondary translation endpoint (MyMemory)
pub const MYMEMORY_URL: &str = "https://api.mymemory.translated.net";

/// Expo push notification endpoint
pub const EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";

/// Users fetched before scoring in smart matching
pub const MATCH_CANDIDATE_POOL: usize = 100;

/// Default number of matches returned
pub const DEFAULT_MATCH_RESULTS: usize = 20;

/// Path of a chat room's message collection.
pub fn messages_collection(room_id: &str) -> String {
    format!("{CHAT_ROOMS}/{room_id}/{MESSAGES}")
}

/// Path of a group chat's message collection.
pub fn group_messages_collection(group_id: &str) -> String {
    format!("{GROUP_CHATS}/{group_id}/{MESSAGES}")
}

/// Path of a user's block-list collection.
pub fn blocked_collection(user_id: &str) -> String {
    format!("{USERS}/{user_id}/{BLOCKED}")
}
