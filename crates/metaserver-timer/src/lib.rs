//! Time for the metaserver: clocks and keyed timers.
//!
//! Every timeout in the lobby (idle ping, ping reply, relogin check, game
//! probes) is a deadline stored in a [`Timers`] queue and compared against
//! a [`Clock`]. Nothing in here sleeps; the event loop asks for the
//! earliest deadline, waits until then, and pops whatever is due.
//!
//! That split keeps timing deterministic: tests drive a [`ManualClock`]
//! by hand, production uses [`TokioClock`], and the engine can't tell the
//! difference.
//!
//! # Integration
//!
//! ```ignore
//! loop {
//!     let deadline = engine.next_deadline().map(|at| clock.instant_at(at));
//!     tokio::select! {
//!         Some(event) = events.recv() => engine.handle(event),
//!         _ = sleep_until_or_forever(deadline) => engine.fire_timers(),
//!     }
//! }
//! ```

mod clock;
mod timers;

pub use clock::{Clock, ManualClock, TokioClock};
pub use timers::Timers;
