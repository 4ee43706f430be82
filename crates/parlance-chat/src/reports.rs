//! Abuse reports.  Reports are append-only; review happens outside the app.

use tracing::info;

use parlance_shared::constants::REPORTS;
use parlance_shared::{ReportId, RoomId, UserId};
use parlance_store::to_fields;

use crate::error::{ChatError, Result};
use crate::models::{now_ms, Report, ReportReason, ReportStatus};
use crate::records::Records;

#[derive(Clone)]
pub struct ReportService {
    records: Records,
}

impl ReportService {
    pub fn new(records: Records) -> Self {
        Self { records }
    }

    /// File a pending report against `reported`, optionally tied to the room
    /// the behaviour happened in.
    pub async fn submit_report(
        &self,
        reporter: &UserId,
        reported: &UserId,
        room: Option<&RoomId>,
        reason: ReportReason,
    ) -> Result<Report> {
        if reporter == reported {
            return Err(ChatError::InvalidRequest("users cannot report themselves".into()));
        }

        let reporter_user = self.records.require_user(reporter).await?;
        let reported_user = self.records.require_user(reported).await?;

        // The room may already be gone if the reporter blocked first.
        if let Some(room_id) = room {
            if let Some(existing) = self.records.room(room_id).await? {
                if !existing.is_participant(reporter) {
                    return Err(ChatError::NotParticipant {
                        user: reporter.clone(),
                        room: room_id.clone(),
                    });
                }
            }
        }

        let mut report = Report {
            id: ReportId::default(),
            reporter_id: reporter.clone(),
            reporter_name: reporter_user.display_name,
            reported_user_id: reported.clone(),
            reported_user_name: reported_user.display_name,
            chat_room_id: room.cloned(),
            reason,
            status: ReportStatus::Pending,
            created_at: now_ms(),
        };
        let id = self.records.store().add(REPORTS, to_fields(&report)?).await?;
        report.id = ReportId(id);

        info!(report = %report.id, reporter = %reporter, reported = %reported, ?reason, "Report filed");
        Ok(report)
    }
}
