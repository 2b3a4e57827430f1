//! Declarative shape checks enforced against a facet once its `init`
//! completes. A [`ContractRegistry`] holds contracts by name; names must
//! be unique, and lookups for an unknown name fail loudly rather than
//! silently passing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::context::{Api, Context};
use crate::error::{Error, Result};
use crate::facet::Facet;
use crate::subsystem::SubsystemHandle;

pub type CustomValidator =
    Arc<dyn Fn(&Context, &Api, &SubsystemHandle, &Facet) -> Result<()> + Send + Sync>;

#[derive(Clone)]
pub struct Contract {
    pub name: String,
    pub required_operations: HashSet<String>,
    pub required_properties: HashSet<String>,
    pub custom_validator: Option<CustomValidator>,
}

impl Contract {
    pub fn new(name: impl Into<String>) -> Self {
        Contract {
            name: name.into(),
            required_operations: HashSet::new(),
            required_properties: HashSet::new(),
            custom_validator: None,
        }
    }

    pub fn require_operation(mut self, name: impl Into<String>) -> Self {
        self.required_operations.insert(name.into());
        self
    }

    pub fn require_property(mut self, name: impl Into<String>) -> Self {
        self.required_properties.insert(name.into());
        self
    }

    pub fn with_validator(mut self, validator: CustomValidator) -> Self {
        self.custom_validator = Some(validator);
        self
    }
}

#[derive(Default)]
pub struct ContractRegistry {
    contracts: HashMap<String, Contract>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        ContractRegistry::default()
    }

    pub fn register(&mut self, contract: Contract) -> Result<()> {
        if self.contracts.contains_key(&contract.name) {
            return Err(Error::DuplicateContract(contract.name));
        }
        self.contracts.insert(contract.name.clone(), contract);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Contract> {
        self.contracts.get(name)
    }

    /// Enforce `name` against `facet`. Missing operations and missing
    /// properties are collected together (not fail-fast) so a single
    /// violation reports every gap at once, with the `FacetContract
    /// '<name>'` context the source design calls for folded into
    /// [`Error::ContractViolation`]'s `name` field.
    pub fn enforce(
        &self,
        name: &str,
        ctx: &Context,
        api: &Api,
        subsystem: &SubsystemHandle,
        facet: &Facet,
    ) -> Result<()> {
        let contract = self.contracts.get(name).ok_or_else(|| Error::UnknownContract(name.to_string()))?;

        let missing_operations: Vec<String> = contract
            .required_operations
            .iter()
            .filter(|op| !facet.get_operation(op).is_some_and(|v| v.is_callable()))
            .cloned()
            .collect();

        let missing_properties: Vec<String> = contract
            .required_properties
            .iter()
            .filter(|prop| facet.get_operation(prop).is_none())
            .cloned()
            .collect();

        if !missing_operations.is_empty() || !missing_properties.is_empty() {
            return Err(Error::ContractViolation {
                name: name.to_string(),
                missing_operations,
                missing_properties,
                custom_message: None,
            });
        }

        if let Some(validator) = &contract.custom_validator {
            validator(ctx, api, subsystem, facet).map_err(|err| Error::ContractViolation {
                name: name.to_string(),
                missing_operations: Vec::new(),
                missing_properties: Vec::new(),
                custom_message: Some(err.to_string()),
            })?;
        }

        Ok(())
    }
}
