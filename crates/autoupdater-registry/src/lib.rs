// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Autoupdater.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! HTTP registry and artifact download support for the update engine

pub mod client;
pub mod downloader;
pub mod error;
pub mod types;

pub use client::RegistryClient;
pub use downloader::HttpArtifactFetcher;
pub use error::{RegistryError, Result};
pub use types::RegistryEntry;
