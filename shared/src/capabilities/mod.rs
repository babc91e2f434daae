mod http;
mod timer;

pub use self::http::{
    bearer, check_header_value, GuardError, HttpResponse, HttpResult, ValidatedUrl,
};
pub use self::timer::{Timer, TimerId, TimerIdSource, TimerOperation, TimerOutput};

// We use Crux's built-in Render capability directly because it provides
// all necessary functionality for triggering view updates.
pub use crux_core::render::Render;
pub use crux_http::http::Method as HttpMethod;
pub use crux_http::{Error as HttpError, Http};

use crate::app::App;
use crate::event::Event;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub render: Render<Event>,
    pub timer: Timer<Event>,
}
