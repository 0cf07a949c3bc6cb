//! `tgoals-registry` – the dependency-resolving parameter stores.
//!
//! Robot behaviors read the world through four named stores of values,
//! boolean literals, boolean fluents and actions. Items are either written
//! from outside (terminal values), fixed (constants), or computed on every
//! read from other items.
//!
//! # Modules
//!
//! - [`item`] – [`RegistryItem`][item::RegistryItem], [`Computed`][item::Computed]
//!   and the [`Arguments`][item::Arguments] handed to computed functions.
//! - [`store`] – [`ParameterStore`][store::ParameterStore]: canonical names,
//!   one-level aliases, role/number scope indices, update timestamps and the
//!   deferred-check queue of a single store.
//! - [`action`] – [`ActionStore`][action::ActionStore]: concrete
//!   [`Action`][action::Action]s, [`ActionTemplate`][action::ActionTemplate]s
//!   used by planners, the idle action, and the `label:value,type` wire
//!   rendering of action parameters.
//! - [`registries`] – [`Registries`][registries::Registries]: the composition
//!   root owning all four stores. It resolves names across stores, rejects
//!   dependency cycles, and retries deferred checks after every write.
//! - [`config`] – [`RegistryConfig`][config::RegistryConfig]: idle skill and
//!   strictness settings.
//!
//! # Concurrency
//!
//! Everything here is synchronous and single-owner. Callers that mutate from
//! several threads wrap one [`Registries`] in a `Mutex`.

pub mod action;
pub mod config;
pub mod item;
pub mod registries;
pub mod store;

pub use action::{
    Action, ActionParam, ActionStore, ActionTemplate, ParamSelector, ParamSource,
    CHECK_TEMPLATE_PREFIX, IDLE_ACTION,
};
pub use config::RegistryConfig;
pub use item::{Arguments, ComputeFn, Computed, RegistryItem};
pub use registries::{DependencyStatus, Registries};
pub use store::{ParameterStore, PendingCheck};
