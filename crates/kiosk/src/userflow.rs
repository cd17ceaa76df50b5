// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The single-card-single-locker decision tree (spec §4.4): turns one
//! `CardScanned` or `LockerSelection` input into exactly one outcome. All
//! locker-state reads/writes go through [`GatewayClient`]; all physical
//! opening goes through [`ModbusController`].

use locker_core::locker::{Locker, LockerStatus, OwnerType};

use crate::config::{AssignmentMode, KioskConfig};
use crate::error::KioskError;
use crate::gateway_client::GatewayClient;
use crate::modbus::controller::ModbusController;
use crate::rfid::CardScanned;

const RECENT_RELEASE_LOOKBACK_HOURS: i64 = 24;

/// A UI/audit-facing event the kiosk's display layer subscribes to (spec
/// §4.4 "Emitted events").
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    ShowAvailableLockers { lockers: Vec<Locker> },
    LockerAssigned { locker_id: i64 },
    LockerOpening { locker_id: i64 },
    LockerOpenedAndReleased { locker_id: i64 },
    LockerOpenedAndOwned { locker_id: i64 },
    LockerOpenedVip { locker_id: i64 },
    LockerAutoAssignSuccess { locker_id: i64 },
    LockerAutoAssignFallback { reason: &'static str },
}

/// The terminal result of one decision-tree walk.
#[derive(Debug, Clone, PartialEq)]
pub enum UserFlowOutcome {
    /// Manual mode, or automatic mode that fell back to manual.
    PresentChoices { available: Vec<Locker> },
    /// Automatic mode: a candidate was found, assigned, and opened.
    AutoAssigned { locker_id: i64 },
    /// `on LockerSelection`: the chosen locker was assigned and opened.
    Opened { locker_id: i64 },
    /// The card already held a locker and retained it (VIP).
    VipRetained { locker_id: i64 },
    /// The card already held a locker and released it on this scan.
    Released { locker_id: i64 },
    Err(KioskError),
}

pub struct UserFlow {
    kiosk_id: String,
    zone: String,
    assignment_mode: AssignmentMode,
    recent_holder_min_hours: i64,
    max_available_lockers_display: usize,
    gateway: GatewayClient,
    modbus: ModbusController,
}

impl UserFlow {
    pub fn new(config: &KioskConfig, gateway: GatewayClient, modbus: ModbusController) -> Self {
        Self {
            kiosk_id: config.kiosk_id.clone(),
            zone: config.zone.clone(),
            assignment_mode: config.assignment_mode(),
            recent_holder_min_hours: config.recent_holder_min_hours,
            max_available_lockers_display: config.max_available_lockers_display,
            gateway,
            modbus,
        }
    }

    /// `on CardScanned(card_id)` (spec §4.4 decision tree).
    pub async fn on_card_scanned(&self, scan: &CardScanned, events: &mut Vec<UiEvent>) -> UserFlowOutcome {
        let existing = match self.gateway.find_owner(OwnerType::Rfid, &scan.card_id).await {
            Ok(existing) => existing,
            Err(_) => return UserFlowOutcome::Err(KioskError::SystemError),
        };

        if let Some(existing) = existing {
            return self.handle_existing_holder(existing, events).await;
        }

        self.handle_new_scan(&scan.card_id, events).await
    }

    async fn handle_existing_holder(&self, existing: Locker, events: &mut Vec<UiEvent>) -> UserFlowOutcome {
        if existing.kiosk_id != self.kiosk_id {
            return UserFlowOutcome::Err(KioskError::OwnershipValidationFailed);
        }
        if !matches!(existing.status, LockerStatus::Owned | LockerStatus::Reserved)
            || existing.owner_type != Some(OwnerType::Rfid)
        {
            return UserFlowOutcome::Err(KioskError::OwnershipValidationFailed);
        }

        events.push(UiEvent::LockerOpening { locker_id: existing.locker_id });
        if !self.modbus.open_locker(existing.locker_id).await {
            // Ownership preserved on opening failure.
            return UserFlowOutcome::Err(KioskError::OpeningFailed);
        }

        if existing.is_vip {
            events.push(UiEvent::LockerOpenedVip { locker_id: existing.locker_id });
            return UserFlowOutcome::VipRetained { locker_id: existing.locker_id };
        }

        let owner_key = existing.owner_key.clone();
        match self.gateway.release(&self.kiosk_id, existing.locker_id, owner_key.as_deref(), Some(OwnerType::Rfid)).await {
            Ok(true) => {
                events.push(UiEvent::LockerOpenedAndReleased { locker_id: existing.locker_id });
                UserFlowOutcome::Released { locker_id: existing.locker_id }
            }
            Ok(false) => UserFlowOutcome::Err(KioskError::SystemError),
            Err(_) => UserFlowOutcome::Err(KioskError::SystemError),
        }
    }

    async fn handle_new_scan(&self, card_id: &str, events: &mut Vec<UiEvent>) -> UserFlowOutcome {
        let available = match self.gateway.list_available(&self.kiosk_id, Some(&self.zone)).await {
            Ok(available) => available,
            Err(_) => return UserFlowOutcome::Err(KioskError::LockerListError),
        };
        if available.is_empty() {
            return UserFlowOutcome::Err(KioskError::NoAvailableLockers);
        }

        if self.assignment_mode == AssignmentMode::Automatic {
            if let Some(outcome) = self.try_automatic_assignment(card_id, &available, events).await {
                return outcome;
            }
        }

        let display: Vec<Locker> = available.into_iter().take(self.max_available_lockers_display).collect();
        events.push(UiEvent::ShowAvailableLockers { lockers: display.clone() });
        UserFlowOutcome::PresentChoices { available: display }
    }

    /// Returns `None` to fall through to manual choice presentation (spec:
    /// "else: fall through to manual selection with fallback_reason").
    async fn try_automatic_assignment(
        &self,
        card_id: &str,
        available: &[Locker],
        events: &mut Vec<UiEvent>,
    ) -> Option<UserFlowOutcome> {
        let candidate_id = match self.gateway.recent_release(&self.kiosk_id, card_id, RECENT_RELEASE_LOOKBACK_HOURS).await {
            Ok(Some(recent))
                if recent.held_duration_hours >= self.recent_holder_min_hours as f64
                    && available.iter().any(|l| l.locker_id == recent.locker_id) =>
            {
                Some(recent.locker_id)
            }
            _ => {
                let allowed_ids: Vec<i64> = available.iter().map(|l| l.locker_id).collect();
                match self.gateway.oldest_available(&self.kiosk_id, Some(&allowed_ids), Some(&self.zone)).await {
                    Ok(Some(locker)) => Some(locker.locker_id),
                    _ => None,
                }
            }
        };

        let candidate_id = candidate_id?;
        match self.assign_and_open(card_id, candidate_id).await {
            UserFlowOutcome::Opened { locker_id } => {
                events.push(UiEvent::LockerAutoAssignSuccess { locker_id });
                Some(UserFlowOutcome::AutoAssigned { locker_id })
            }
            UserFlowOutcome::Err(err) => {
                events.push(UiEvent::LockerAutoAssignFallback { reason: err.as_str() });
                None
            }
            other => Some(other),
        }
    }

    /// `on LockerSelection(card_id, chosen_id)` (spec §4.4 decision tree).
    pub async fn on_locker_selection(&self, card_id: &str, chosen_id: i64, events: &mut Vec<UiEvent>) -> UserFlowOutcome {
        let outcome = self.assign_and_open(card_id, chosen_id).await;
        if let UserFlowOutcome::Opened { locker_id } = outcome {
            events.push(UiEvent::LockerOpenedAndOwned { locker_id });
        }
        outcome
    }

    async fn assign_and_open(&self, card_id: &str, locker_id: i64) -> UserFlowOutcome {
        let assigned = match self.gateway.assign(&self.kiosk_id, locker_id, OwnerType::Rfid, card_id).await {
            Ok(assigned) => assigned,
            Err(_) => return UserFlowOutcome::Err(KioskError::SystemError),
        };
        if !assigned {
            return UserFlowOutcome::Err(KioskError::AssignmentFailed);
        }

        if !self.modbus.open_locker(locker_id).await {
            let _ = self.gateway.release(&self.kiosk_id, locker_id, Some(card_id), Some(OwnerType::Rfid)).await;
            return UserFlowOutcome::Err(KioskError::OpeningFailed);
        }

        match self.gateway.confirm(&self.kiosk_id, locker_id).await {
            Ok(true) => UserFlowOutcome::Opened { locker_id },
            _ => UserFlowOutcome::Err(KioskError::SystemError),
        }
    }

    /// Staff-invoked emergency release (spec §4.4 "Emergency release"): force
    /// the door open, then force the locker row free, regardless of ownership.
    pub async fn emergency_release(&self, locker_id: i64, staff_user: &str, reason: &str) -> Result<bool, KioskError> {
        tracing::warn!(locker_id, staff_user, reason, "emergency release invoked");
        if !self.modbus.open_locker(locker_id).await {
            return Err(KioskError::OpeningFailed);
        }
        self.gateway
            .release(&self.kiosk_id, locker_id, None, None)
            .await
            .map_err(|_| KioskError::SystemError)
    }
}

#[cfg(test)]
#[path = "userflow_tests.rs"]
mod tests;
