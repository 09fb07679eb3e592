pub mod app;
pub mod buttons;
pub mod event_handler;
pub mod layout;
pub mod readout;
pub mod render_pipeline;
pub mod spectrum;
pub mod window;

pub use app::run;
