// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Application install planning

use log::debug;
use serde::{Deserialize, Serialize};

use ledger_dmk_apdu::{DeviceModelId, FirmwareVersion};

use crate::{
    manager::{Application, DeviceMetadata},
    Error,
};

/// Minimum version marker requiring the latest catalog version
pub const LATEST_VERSION: &str = "latest";

/// Version constraint on a requested application
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationConstraint {
    /// Minimum version, or `latest`
    pub min_version: String,
    /// Models the constraint applies to, all models when unset
    #[serde(default)]
    pub applicable_models: Option<Vec<DeviceModelId>>,
    /// Models exempt from the constraint
    #[serde(default)]
    pub exempt_models: Option<Vec<DeviceModelId>>,
}

impl ApplicationConstraint {
    pub fn min_version(v: impl Into<String>) -> Self {
        Self {
            min_version: v.into(),
            ..Default::default()
        }
    }

    fn applies_to(&self, model: DeviceModelId) -> bool {
        if let Some(m) = &self.exempt_models {
            if m.contains(&model) {
                return false;
            }
        }

        match &self.applicable_models {
            Some(m) => m.contains(&model),
            None => true,
        }
    }
}

/// Application to be installed, with optional constraints
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDependency {
    pub name: String,
    #[serde(default)]
    pub constraints: Option<Vec<ApplicationConstraint>>,
}

impl ApplicationDependency {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraints: None,
        }
    }

    pub fn with_constraint(mut self, c: ApplicationConstraint) -> Self {
        self.constraints.get_or_insert_with(Vec::new).push(c);
        self
    }
}

/// Applications to install, in install order
#[derive(Clone, PartialEq, Debug, Default)]
pub struct InstallPlan {
    pub install_plan: Vec<Application>,
    pub already_installed: Vec<String>,
    pub missing_applications: Vec<String>,
}

/// Check an application version against the first constraint applying to `model`
fn validate_constraint(
    model: DeviceModelId,
    app: &Application,
    catalog_app: Option<&Application>,
    constraints: Option<&[ApplicationConstraint]>,
) -> bool {
    let constraints = match constraints {
        Some(c) => c,
        None => return true,
    };

    match constraints.iter().find(|c| c.applies_to(model)) {
        Some(c) if c.min_version == LATEST_VERSION => match catalog_app {
            Some(latest) => app.firmware_version() >= latest.firmware_version(),
            None => true,
        },
        Some(c) => {
            app.firmware_version() >= FirmwareVersion::coerce(&c.min_version).unwrap_or_default()
        }
        None => true,
    }
}

/// Build the install plan for the requested applications
///
/// Installed applications meeting their constraints are skipped, catalog
/// applications meeting them are planned with any missing parent
/// application ahead of them.
pub fn build_install_plan(
    metadata: &DeviceMetadata,
    model: DeviceModelId,
    applications: &[ApplicationDependency],
    allow_missing_application: bool,
) -> Result<InstallPlan, Error> {
    let mut plan = InstallPlan::default();

    for app in applications {
        let catalog_app = metadata.catalog_app(&app.name);
        let installed_app = metadata.installed_app(&app.name);
        let constraints = app.constraints.as_deref();

        if let Some(i) = installed_app {
            if validate_constraint(model, i, catalog_app, constraints) {
                plan.already_installed.push(app.name.clone());
                continue;
            }
        }

        match catalog_app {
            Some(c) if validate_constraint(model, c, None, constraints) => {
                plan.install_plan.push(c.clone());
            }
            _ if allow_missing_application => {
                plan.missing_applications.push(app.name.clone());
            }
            _ if metadata.firmware_update_context.available_update.is_some() => {
                return Err(Error::UnsupportedFirmware(format!(
                    "Application {} needs latest firmware",
                    app.name
                )));
            }
            _ => {
                return Err(Error::UnsupportedApplication(format!(
                    "Application {} not supported for this device",
                    app.name
                )));
            }
        }
    }

    // Parent applications missing from the device go first
    let mut ordered: Vec<Application> = plan
        .install_plan
        .iter()
        .filter_map(|a| a.parent_name.as_deref())
        .filter(|p| metadata.installed_app(p).is_none())
        .filter_map(|p| metadata.catalog_app(p).cloned())
        .collect();
    ordered.append(&mut plan.install_plan);

    for a in ordered {
        if !plan
            .install_plan
            .iter()
            .any(|p| p.version_name == a.version_name)
        {
            plan.install_plan.push(a);
        }
    }

    debug!(
        "Install plan: {:?}, already installed: {:?}, missing: {:?}",
        plan.install_plan
            .iter()
            .map(|a| a.version_name.as_str())
            .collect::<Vec<_>>(),
        plan.already_installed,
        plan.missing_applications
    );

    Ok(plan)
}
