use std::sync::Arc;

use motorhub_chat::{ChatCoordinator, ModerationReportBuilder};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub chat: Arc<ChatCoordinator>,
    pub reports: Arc<ModerationReportBuilder>,
    pub jwt_secret: String,
}
