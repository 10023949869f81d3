//! Switchyard: a finite state machine runtime.
//!
//! A machine drives one state value through declared transitions. Around
//! every settled change it runs a small lifecycle:
//!
//! - **Effects** start when a state tag is entered and are torn down exactly
//!   once before the next one starts or the machine is destroyed.
//! - **Commands** are background tasks allowed only in some states; a
//!   transition cancels the ones the new state no longer allows.
//! - **Dispatch** is reentrancy-safe: actions dispatched by effects,
//!   reactions or other threads are queued and drained in order, and
//!   subscribers hear about the final state once.
//!
//! # Example
//!
//! ```rust
//! use switchyard::{action_enum, state_enum, Cleanup, MachineBuilder, StateBuilder};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! state_enum! {
//!     enum Day {
//!         Home,
//!         Work,
//!         Bed,
//!         Lost,
//!     }
//!     error: [Lost]
//! }
//!
//! action_enum! {
//!     enum Routine {
//!         Commute,
//!         Sleep,
//!     }
//! }
//!
//! let cleanups = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&cleanups);
//!
//! let machine = MachineBuilder::<Day, Routine>::new()
//!     .initial(Day::Home)
//!     .state("Home", StateBuilder::new().to("Commute", Day::Work))
//!     .state(
//!         "Work",
//!         StateBuilder::new()
//!             .to("Commute", Day::Home)
//!             .effect(move |_| {
//!                 let counter = Arc::clone(&counter);
//!                 Some(Cleanup::new(move || {
//!                     counter.fetch_add(1, Ordering::SeqCst);
//!                 }))
//!             }),
//!     )
//!     .error_state(|_, _| Day::Lost)
//!     .build()
//!     .unwrap();
//!
//! machine.dispatch(Routine::Commute).unwrap();
//! assert!(machine.is_state(&["Work"]));
//!
//! machine.dispatch(Routine::Commute).unwrap();
//! assert_eq!(cleanups.load(Ordering::SeqCst), 1);
//!
//! // Home declares no Sleep rule: the action is ignored.
//! machine.dispatch(Routine::Sleep).unwrap();
//! assert_eq!(*machine.get_state(), Day::Home);
//! ```

pub mod builder;
pub mod commands;
pub mod core;
pub mod effects;
pub mod error;
pub mod machine;
pub mod observer;
pub mod options;
pub mod relay;
pub mod transition;

// Re-export commonly used types
pub use builder::{BuildError, BuildErrors, MachineBuilder, StateBuilder};
pub use commands::{CancelReason, CommandCancel, CommandContext, CommandId, StopHandle};
pub use core::{Action, Command, Guard, NoCommand, State};
pub use effects::{Cleanup, EffectContext, ScopedEffects, Teardown};
pub use error::{EffectScope, MachineError};
pub use machine::{Dispatcher, Machine};
pub use observer::{Diagnostic, Observer, Severity, TracingObserver};
pub use options::MachineOptions;
pub use relay::Subscription;
pub use transition::{GateRejection, TransitionError, TransitionResult, UnhandledReason};
