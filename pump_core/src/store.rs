//! Owner of every dosing profile and of the active-profile pointer.
//!
//! Profiles never leave the store by value except as read-only snapshots;
//! everything else refers to a profile by name. Once any profile exists,
//! exactly one is active.

use crate::error::{PumpError, Result};
use crate::profile::{Profile, ProfileParams};

#[derive(Debug, Default)]
pub struct ProfileStore {
    profiles: Vec<Profile>,
    active: Option<String>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store a new profile. The first profile ever stored becomes active.
    pub fn create(&mut self, name: &str, params: ProfileParams) -> Result<()> {
        if self.position(name).is_some() {
            tracing::warn!(profile = name, "create rejected: duplicate name");
            return Err(PumpError::DuplicateName(name.to_string()));
        }
        if name.is_empty() {
            return Err(PumpError::EmptyName);
        }
        if let Err(e) = params.validate() {
            tracing::warn!(profile = name, error = %e, "create rejected");
            return Err(e);
        }

        self.profiles.push(Profile::new(name.to_string(), params));
        if self.active.is_none() {
            self.set_active(name);
        }
        tracing::info!(profile = name, "profile created");
        Ok(())
    }

    /// Case-sensitive exact lookup.
    pub fn read(&self, name: &str) -> Option<&Profile> {
        self.position(name).map(|i| &self.profiles[i])
    }

    /// Replace all parameters of an existing profile. The active pointer is untouched.
    pub fn update(&mut self, name: &str, params: ProfileParams) -> Result<()> {
        let idx = self
            .position(name)
            .ok_or_else(|| PumpError::NotFound(name.to_string()))?;
        if let Err(e) = params.validate() {
            tracing::warn!(profile = name, error = %e, "update rejected");
            return Err(e);
        }
        self.profiles[idx].set_params(params);
        tracing::info!(profile = name, "profile updated");
        Ok(())
    }

    pub fn delete(&mut self, name: &str) -> Result<()> {
        let idx = self
            .position(name)
            .ok_or_else(|| PumpError::NotFound(name.to_string()))?;
        if self.active.as_deref() == Some(name) {
            return Err(PumpError::CannotDeleteActive(name.to_string()));
        }
        self.profiles.remove(idx);
        tracing::info!(profile = name, "profile deleted");
        Ok(())
    }

    pub fn activate(&mut self, name: &str) -> Result<()> {
        if self.position(name).is_none() {
            return Err(PumpError::NotFound(name.to_string()));
        }
        self.set_active(name);
        tracing::info!(profile = name, "profile activated");
        Ok(())
    }

    pub fn active(&self) -> Option<&Profile> {
        self.active.as_deref().and_then(|n| self.read(n))
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Names in creation order.
    pub fn names(&self) -> Vec<String> {
        self.profiles.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.iter()
    }

    /// Re-check every stored profile against the parameter bounds.
    ///
    /// Returns `(all_valid, descriptions)`; never mutates.
    pub fn validate_all(&self) -> (bool, Vec<String>) {
        let errors: Vec<String> = self
            .profiles
            .iter()
            .flat_map(|p| {
                p.params()
                    .violations()
                    .into_iter()
                    .map(move |v| format!("Profile '{}': {v}", p.name()))
            })
            .collect();
        (errors.is_empty(), errors)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.profiles.iter().position(|p| p.name() == name)
    }

    fn set_active(&mut self, name: &str) {
        for p in &mut self.profiles {
            p.is_active = p.name() == name;
        }
        self.active = Some(name.to_string());
    }

    #[cfg(test)]
    pub(crate) fn insert_unchecked(&mut self, profile: Profile) {
        self.profiles.push(profile);
    }
}
