use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use motorhub_db::ReportRepositoryRef;
use motorhub_gateway::MessageChannel;
use motorhub_types::{Message, ModerationReport, Participant, REPORT_SAMPLE_SIZE, ThreadKey};

use crate::error::ChatError;
use crate::stats::ChatStats;

/// Read access to a thread's current contents.
#[async_trait::async_trait]
pub trait ThreadReader: Send + Sync {
    async fn snapshot(&self, thread: &ThreadKey) -> Result<Vec<Message>, ChatError>;
}

#[async_trait::async_trait]
impl ThreadReader for MessageChannel {
    async fn snapshot(&self, thread: &ThreadKey) -> Result<Vec<Message>, ChatError> {
        Ok(MessageChannel::snapshot(self, thread).await?)
    }
}

/// Files abuse reports carrying a frozen copy of the last few messages.
pub struct ModerationReportBuilder {
    reader: Arc<dyn ThreadReader>,
    repo: ReportRepositoryRef,
    stats: Arc<ChatStats>,
}

impl ModerationReportBuilder {
    pub fn new(reader: Arc<dyn ThreadReader>, repo: ReportRepositoryRef, stats: Arc<ChatStats>) -> Self {
        Self { reader, repo, stats }
    }

    /// File a report. Storing it is best-effort: a failed write is logged and
    /// counted, and the caller still gets the report back.
    pub async fn report(
        &self,
        reporter: &Participant,
        reported: &Participant,
        thread: &ThreadKey,
        comment: Option<String>,
    ) -> Result<ModerationReport, ChatError> {
        if !thread.is_member(reporter) {
            return Err(ChatError::PermissionDenied(format!("{} is not part of {}", reporter, thread)));
        }
        if reporter == reported || !thread.is_member(reported) {
            return Err(ChatError::InvalidInput(format!(
                "{} cannot be reported from {}",
                reported, thread
            )));
        }

        let mut messages = self.reader.snapshot(thread).await?;
        let tail = messages.len().saturating_sub(REPORT_SAMPLE_SIZE);
        let sample = messages.split_off(tail);

        let report = ModerationReport {
            id: Uuid::new_v4(),
            reporter_id: reporter.clone(),
            reported_user_id: reported.clone(),
            car_id: thread.car_id.clone(),
            owner: thread.owner.clone(),
            thread: thread.clone(),
            timestamp: Utc::now(),
            comment: comment.filter(|c| !c.trim().is_empty()),
            messages: sample,
            revised: false,
        };

        match self.repo.insert(&report).await {
            Ok(()) => {
                ChatStats::bump(&self.stats.reports_filed);
                info!(report = %report.id, reporter = %reporter, reported = %reported, "Report filed");
            }
            Err(e) => {
                ChatStats::bump(&self.stats.report_write_failures);
                warn!(report = %report.id, "Failed to persist report: {}", e);
            }
        }

        Ok(report)
    }

    /// Newest first.
    pub async fn list(&self) -> Result<Vec<ModerationReport>, ChatError> {
        Ok(self.repo.list().await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<ModerationReport, ChatError> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| ChatError::not_found("report", id))
    }

    pub async fn mark_revised(&self, id: Uuid) -> Result<(), ChatError> {
        if !self.repo.mark_revised(id).await? {
            return Err(ChatError::not_found("report", id));
        }
        info!(report = %id, "Report marked revised");
        Ok(())
    }
}
