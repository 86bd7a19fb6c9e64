/*!
 * Monitoring
 * Tracing setup and per-wait spans
 */

mod tracer;

pub use tracer::{generate_trace_id, init_tracing, span_wait, WaitSpan};
