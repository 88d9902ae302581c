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

//! Logs update notifications until the engine closes the channel

use autoupdater_core::{NotificationReceiver, UpdateOutcome};
use tracing::{error, info};

/// Returns the number of notifications seen once the channel is closed
pub async fn run(mut notifications: NotificationReceiver) -> usize {
    let mut seen = 0;
    while let Some(notification) = notifications.recv().await {
        seen += 1;
        match &notification.outcome {
            UpdateOutcome::Updated(changelog) => info!(
                extension = %notification.extension_id,
                from = %changelog.previous_version,
                to = %changelog.updated_version,
                at = %notification.occurred_at,
                "{notification}"
            ),
            UpdateOutcome::Failed(_) => error!(
                extension = %notification.extension_id,
                at = %notification.occurred_at,
                "{notification}"
            ),
        }
    }
    info!("Notification channel closed after {seen} notifications");
    seen
}
