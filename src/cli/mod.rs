pub mod history;
pub mod rate;
pub mod refresh;
pub mod setup;
pub mod ui;
pub mod watch;
