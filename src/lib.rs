// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod delivery;
pub mod envelope;
pub mod mapper;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod publish;
pub mod record;
pub mod template;
pub mod validate;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router;
pub use crate::config::PipelineConfig;
pub use crate::delivery::{Delivered, DeliveryClient, DeliveryError, DispatchClient, ResponseBody};
pub use crate::mapper::{FieldMapper, FieldRule};
pub use crate::notify::{Notifier, StatusKind, StatusMessage};
pub use crate::pipeline::{Outcome, Pipeline};
pub use crate::record::Record;
pub use crate::validate::{Validation, Validator};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the fmt subscriber. `RUST_LOG` wins over the default filter;
/// `LOG_FORMAT=json` switches to JSON lines. Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("immiwatch_pipeline=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
