//! `sim` — Localization movie simulator: emitters, scenarios, table I/O.

pub mod emitter;
pub mod movie;
pub mod scenarios;
pub mod table;

pub use emitter::{Emitter, Photophysics};
pub use movie::{ImagingParams, MovieSimulator, SimulatedMovie};
pub use scenarios::{Scenario, ScenarioKind};
pub use table::{
    load_table, load_truth, save_table, save_trajectories, save_truth, LocalizationTable,
};
