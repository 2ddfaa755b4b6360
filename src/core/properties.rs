/*
 * Property resolution for tree items.
 *
 * A resource kind publishes a `PropertyCatalog`: a lookup table from property name to
 * a `PropertyDef` holding the display formatter and the sort-key extractor for that
 * property, plus the roles (label, description, group-by, sort-by) it may be used in.
 * The grouping and sort engines only ever see resolved `PropertyDef`s, so adding a
 * property is a new table entry and never a change to the engines.
 */
use super::errors::{Result, TreeError};
use std::cmp::Ordering;
use std::fmt;

// Group-by sentinel meaning "flat list".
pub const GROUP_BY_NONE: &str = "None";
// Sort pseudo-property: order by whatever the label property currently is.
pub const SORT_BY_LABEL: &str = "Label";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyRole {
    Label,
    Description,
    GroupBy,
    SortBy,
}

impl fmt::Display for PropertyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PropertyRole::Label => "label",
            PropertyRole::Description => "description",
            PropertyRole::GroupBy => "group-by",
            PropertyRole::SortBy => "sort-by",
        };
        f.write_str(text)
    }
}

pub const ALL_ROLES: &[PropertyRole] = &[
    PropertyRole::Label,
    PropertyRole::Description,
    PropertyRole::GroupBy,
    PropertyRole::SortBy,
];

/*
 * Comparable key derived from a resolved property. Numeric properties compare by
 * value, everything else lexically by the displayed string. `Missing` sorts before
 * any present value in ascending order.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    Missing,
    Number(i128),
    Text(String),
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Missing, SortKey::Missing) => Ordering::Equal,
            (SortKey::Missing, _) => Ordering::Less,
            (_, SortKey::Missing) => Ordering::Greater,
            (SortKey::Number(a), SortKey::Number(b)) => a.cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            // A catalog entry never mixes key kinds; keep the order total anyway.
            (SortKey::Number(_), SortKey::Text(_)) => Ordering::Less,
            (SortKey::Text(_), SortKey::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

enum KeyKind<T> {
    Lexical,
    Numeric(fn(&T) -> Option<i128>),
}

impl<T> Clone for KeyKind<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for KeyKind<T> {}

pub struct PropertyDef<T> {
    pub name: &'static str,
    pub roles: &'static [PropertyRole],
    display: fn(&T) -> String,
    key: KeyKind<T>,
}

impl<T> Clone for PropertyDef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PropertyDef<T> {}

impl<T> fmt::Debug for PropertyDef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDef")
            .field("name", &self.name)
            .field("roles", &self.roles)
            .field("numeric", &matches!(self.key, KeyKind::Numeric(_)))
            .finish()
    }
}

impl<T> PropertyDef<T> {
    /// A property sorted lexically by its displayed value.
    pub const fn text(
        name: &'static str,
        roles: &'static [PropertyRole],
        display: fn(&T) -> String,
    ) -> Self {
        PropertyDef {
            name,
            roles,
            display,
            key: KeyKind::Lexical,
        }
    }

    /// A property whose display is formatted but whose ordering uses the raw number.
    pub const fn numeric(
        name: &'static str,
        roles: &'static [PropertyRole],
        display: fn(&T) -> String,
        number: fn(&T) -> Option<i128>,
    ) -> Self {
        PropertyDef {
            name,
            roles,
            display,
            key: KeyKind::Numeric(number),
        }
    }

    pub fn value(&self, item: &T) -> String {
        (self.display)(item)
    }

    pub fn sort_key(&self, item: &T) -> SortKey {
        match self.key {
            KeyKind::Lexical => SortKey::Text(self.value(item)),
            KeyKind::Numeric(number) => number(item).map_or(SortKey::Missing, SortKey::Number),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.key, KeyKind::Numeric(_))
    }

    pub fn supports(&self, role: PropertyRole) -> bool {
        self.roles.contains(&role)
    }
}

pub struct PropertyCatalog<T> {
    properties: Vec<PropertyDef<T>>,
}

impl<T> PropertyCatalog<T> {
    pub fn new(properties: Vec<PropertyDef<T>>) -> Self {
        PropertyCatalog { properties }
    }

    pub fn get(&self, name: &str) -> Option<&PropertyDef<T>> {
        self.properties.iter().find(|p| p.name == name)
    }

    /*
     * Looks up `name` and checks it may be used in `role`.
     * Unknown names and role violations are configuration defects, not runtime
     * conditions, and are reported as `TreeError::Configuration`.
     */
    pub fn resolve(&self, name: &str, role: PropertyRole) -> Result<&PropertyDef<T>> {
        let property = self.get(name).ok_or_else(|| {
            TreeError::configuration(format!("Unknown property '{name}'"))
        })?;
        if !property.supports(role) {
            return Err(TreeError::configuration(format!(
                "Property '{name}' cannot be used as {role}"
            )));
        }
        Ok(property)
    }

    pub fn names_for(&self, role: PropertyRole) -> Vec<&'static str> {
        self.properties
            .iter()
            .filter(|p| p.supports(role))
            .map(|p| p.name)
            .collect()
    }

    pub fn value(&self, item: &T, name: &str) -> Result<String> {
        self.get(name)
            .map(|p| p.value(item))
            .ok_or_else(|| TreeError::configuration(format!("Unknown property '{name}'")))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyDef<T>> {
        self.properties.iter()
    }
}
