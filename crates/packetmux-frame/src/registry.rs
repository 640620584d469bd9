use std::collections::HashMap;

use crate::error::RegistryError;
use crate::ids::{PacketTypeId, CONTROL_NAME, FIRST_APPLICATION_ID, INVALID_NAME};

/// Bidirectional map between packet type names and dense numeric ids.
///
/// Two peers configured with the same ordered name list agree on every id
/// without negotiation: application names are numbered `2, 3, …` in list
/// order, after the reserved `"<invalid>"` and `"<control>"` entries.
///
/// The registry is immutable after construction and is shared between the
/// muxer, the demuxer, and any application thread via `Arc`.
#[derive(Debug)]
pub struct IdRegistry {
    by_name: HashMap<String, PacketTypeId>,
    by_id: Vec<String>,
}

impl IdRegistry {
    /// Build a registry from an ordered list of application type names.
    ///
    /// Rejects duplicates and the two reserved names.
    pub fn from_names<I, S>(names: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut by_name = HashMap::new();
        let mut by_id = Vec::with_capacity(FIRST_APPLICATION_ID as usize);

        for reserved in [INVALID_NAME, CONTROL_NAME] {
            by_name.insert(reserved.to_string(), by_id.len() as PacketTypeId);
            by_id.push(reserved.to_string());
        }

        for name in names {
            let name = name.into();
            if name == INVALID_NAME || name == CONTROL_NAME {
                return Err(RegistryError::ReservedName(name));
            }
            let id = by_id.len() as PacketTypeId;
            if by_name.insert(name.clone(), id).is_some() {
                return Err(RegistryError::DuplicateName(name));
            }
            by_id.push(name);
        }

        Ok(Self { by_name, by_id })
    }

    /// Resolve a type name to its id.
    pub fn id_of(&self, name: &str) -> Result<PacketTypeId, RegistryError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| RegistryError::UnknownName(name.to_string()))
    }

    /// Resolve a type id to its name.
    pub fn name_of(&self, id: PacketTypeId) -> Result<&str, RegistryError> {
        self.by_id
            .get(id as usize)
            .map(String::as_str)
            .ok_or(RegistryError::UnknownId(id))
    }

    /// Total number of ids, reserved entries included.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True only for a registry with no application types.
    pub fn is_empty(&self) -> bool {
        self.by_id.len() == FIRST_APPLICATION_ID as usize
    }

    /// All registered names in id order, reserved entries first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_id.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use crate::ids::{CONTROL, INVALID};

    use super::*;

    #[test]
    fn ids_assigned_in_registration_order() {
        let registry = IdRegistry::from_names(["T1", "T2", "T3"]).unwrap();

        assert_eq!(registry.id_of(INVALID_NAME).unwrap(), INVALID);
        assert_eq!(registry.id_of(CONTROL_NAME).unwrap(), CONTROL);
        assert_eq!(registry.id_of("T1").unwrap(), 2);
        assert_eq!(registry.id_of("T2").unwrap(), 3);
        assert_eq!(registry.id_of("T3").unwrap(), 4);

        assert_eq!(registry.name_of(0).unwrap(), INVALID_NAME);
        assert_eq!(registry.name_of(1).unwrap(), CONTROL_NAME);
        assert_eq!(registry.name_of(2).unwrap(), "T1");
        assert_eq!(registry.name_of(3).unwrap(), "T2");
        assert_eq!(registry.name_of(4).unwrap(), "T3");
    }

    #[test]
    fn empty_registry_still_has_reserved_entries() {
        let registry = IdRegistry::from_names(Vec::<String>::new()).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.id_of(CONTROL_NAME).unwrap(), CONTROL);
    }

    #[test]
    fn unknown_name_and_id_are_errors() {
        let registry = IdRegistry::from_names(["T1"]).unwrap();

        assert_eq!(
            registry.id_of("nope"),
            Err(RegistryError::UnknownName("nope".to_string()))
        );
        assert_eq!(registry.name_of(3), Err(RegistryError::UnknownId(3)));
    }

    #[test]
    fn duplicates_rejected() {
        let result = IdRegistry::from_names(["T1", "T2", "T1"]);
        assert_eq!(
            result.unwrap_err(),
            RegistryError::DuplicateName("T1".to_string())
        );
    }

    #[test]
    fn reserved_names_rejected() {
        assert_eq!(
            IdRegistry::from_names(["T1", INVALID_NAME]).unwrap_err(),
            RegistryError::ReservedName(INVALID_NAME.to_string())
        );
        assert_eq!(
            IdRegistry::from_names([CONTROL_NAME]).unwrap_err(),
            RegistryError::ReservedName(CONTROL_NAME.to_string())
        );
    }

    #[test]
    fn names_iterates_in_id_order() {
        let registry = IdRegistry::from_names(["A", "B"]).unwrap();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec![INVALID_NAME, CONTROL_NAME, "A", "B"]);
    }
}
