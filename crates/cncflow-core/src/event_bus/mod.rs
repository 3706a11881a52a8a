//! # Event Bus Module
//!
//! Provides a unified event bus for decoupled communication between the
//! job-control session, the controller link and the host.
//!
//! ## Overview
//!
//! - Publishers emit typed events without knowing subscribers
//! - Subscribers filter and receive events of interest
//! - Scoped subscriptions unsubscribe when their guard is dropped
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cncflow_core::event_bus::{event_bus, AppEvent, EventCategory, EventFilter, ToolChangeEvent};
//!
//! let guard = event_bus().subscribe_scoped(
//!     EventFilter::Categories(vec![EventCategory::ToolChange]),
//!     |event| {
//!         if let AppEvent::ToolChange(ToolChangeEvent::Paused { comment }) = event {
//!             println!("Tool change: {}", comment);
//!         }
//!     },
//! );
//!
//! event_bus().publish(AppEvent::ToolChange(ToolChangeEvent::Paused {
//!     comment: "T2 6mm endmill".to_string(),
//! }));
//!
//! drop(guard);
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
