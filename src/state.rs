use crate::config::settings::AppConfig;
use crate::modules::dispatch::scheduler::SchedulerState;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub scheduler: SchedulerState,
}

impl AppState {
    pub fn new(config: AppConfig, scheduler: SchedulerState) -> Self {
        Self { config, scheduler }
    }
}
