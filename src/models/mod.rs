// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod conquest;
pub mod cyclist;
pub mod mountain_pass;
pub mod race_finish;

pub use activity::{ActivityType, ExternalActivity};
pub use conquest::ConquestRecord;
pub use cyclist::{CredentialState, CredentialUpdate, Cyclist, CyclistCredential};
pub use mountain_pass::{LatLng, MountainPass};
pub use race_finish::RaceFinish;
