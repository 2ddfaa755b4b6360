/*
 * Property catalog for the images tree.
 * Each entry formats one aspect of an `ItemDescriptor` for display; `CreatedTime` and
 * `Size` keep their raw numbers as sort keys so ordering is chronological/by bytes
 * rather than by the formatted text. `Size` is deliberately not groupable.
 */
use super::models::{ItemDescriptor, NONE_PLACEHOLDER};
use super::properties::{ALL_ROLES, PropertyCatalog, PropertyDef, PropertyRole};
use time::OffsetDateTime;

const DISPLAY_ROLES: &[PropertyRole] = &[
    PropertyRole::Label,
    PropertyRole::Description,
    PropertyRole::GroupBy,
];
const NO_GROUP_ROLES: &[PropertyRole] = &[
    PropertyRole::Label,
    PropertyRole::Description,
    PropertyRole::SortBy,
];

const SHORT_ID_LEN: usize = 12;

pub fn image_catalog() -> PropertyCatalog<ItemDescriptor> {
    PropertyCatalog::new(vec![
        PropertyDef::numeric("CreatedTime", ALL_ROLES, created_time, created_timestamp),
        PropertyDef::text("FullTag", DISPLAY_ROLES, full_tag),
        PropertyDef::text("ImageId", DISPLAY_ROLES, image_id),
        PropertyDef::text("Repository", DISPLAY_ROLES, repository),
        PropertyDef::text("RepositoryName", DISPLAY_ROLES, repository_name),
        PropertyDef::text("RepositoryNameAndTag", DISPLAY_ROLES, repository_name_and_tag),
        PropertyDef::numeric("Size", NO_GROUP_ROLES, size, size_bytes),
        PropertyDef::text("Tag", DISPLAY_ROLES, tag),
    ])
}

fn or_placeholder(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => NONE_PLACEHOLDER,
    }
}

fn created_time(item: &ItemDescriptor) -> String {
    format_relative_time(item.created, OffsetDateTime::now_utc())
}

fn created_timestamp(item: &ItemDescriptor) -> Option<i128> {
    Some(item.created.unix_timestamp_nanos())
}

fn full_tag(item: &ItemDescriptor) -> String {
    format!("{}:{}", repository(item), tag(item))
}

fn image_id(item: &ItemDescriptor) -> String {
    let id = item.id.strip_prefix("sha256:").unwrap_or(&item.id);
    id.chars().take(SHORT_ID_LEN).collect()
}

fn repository(item: &ItemDescriptor) -> String {
    or_placeholder(item.repository.as_deref()).to_string()
}

fn repository_name(item: &ItemDescriptor) -> String {
    let repository = or_placeholder(item.repository.as_deref());
    if repository == NONE_PLACEHOLDER {
        return repository.to_string();
    }
    repository
        .rsplit('/')
        .next()
        .unwrap_or(repository)
        .to_string()
}

fn repository_name_and_tag(item: &ItemDescriptor) -> String {
    format!("{}:{}", repository_name(item), tag(item))
}

fn size(item: &ItemDescriptor) -> String {
    format_size(item.size)
}

fn size_bytes(item: &ItemDescriptor) -> Option<i128> {
    Some(i128::from(item.size))
}

fn tag(item: &ItemDescriptor) -> String {
    or_placeholder(item.tag.as_deref()).to_string()
}

// Decimal units, matching what the docker CLI prints.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["kB", "MB", "GB", "TB", "PB"];
    if bytes < 1000 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for candidate in UNITS {
        if value < 1000.0 {
            break;
        }
        value /= 1000.0;
        unit = candidate;
    }
    let text = format!("{value:.1}");
    let text = text.strip_suffix(".0").unwrap_or(&text);
    format!("{text} {unit}")
}

/*
 * "3 days ago" style text relative to `now`. Timestamps in the future (clock skew
 * between the runtime and this host) read as "now".
 */
pub fn format_relative_time(created: OffsetDateTime, now: OffsetDateTime) -> String {
    let elapsed: std::time::Duration = (now - created).try_into().unwrap_or_default();
    timeago::Formatter::new().convert(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn item() -> ItemDescriptor {
        ItemDescriptor::new(
            "sha256:0123456789abcdef0123",
            datetime!(2024-05-01 12:00 UTC),
        )
        .with_repository("ghcr.io/acme/web")
        .with_tag("v1.2")
        .with_size(142_600_000)
    }

    #[test]
    fn test_image_id_is_short_and_without_algorithm() {
        let catalog = image_catalog();
        assert_eq!(catalog.value(&item(), "ImageId").unwrap(), "0123456789ab");
    }

    #[test]
    fn test_repository_variants() {
        let catalog = image_catalog();
        let item = item();
        assert_eq!(catalog.value(&item, "Repository").unwrap(), "ghcr.io/acme/web");
        assert_eq!(catalog.value(&item, "RepositoryName").unwrap(), "web");
        assert_eq!(catalog.value(&item, "RepositoryNameAndTag").unwrap(), "web:v1.2");
        assert_eq!(catalog.value(&item, "FullTag").unwrap(), "ghcr.io/acme/web:v1.2");
        assert_eq!(catalog.value(&item, "Tag").unwrap(), "v1.2");
    }

    #[test]
    fn test_dangling_image_uses_placeholders() {
        let catalog = image_catalog();
        let dangling = ItemDescriptor::new("sha256:ff", datetime!(2024-05-01 12:00 UTC));
        assert_eq!(catalog.value(&dangling, "Repository").unwrap(), "<none>");
        assert_eq!(catalog.value(&dangling, "RepositoryName").unwrap(), "<none>");
        assert_eq!(catalog.value(&dangling, "FullTag").unwrap(), "<none>:<none>");
    }

    #[test]
    fn test_size_is_not_groupable_but_sortable() {
        let catalog = image_catalog();
        assert!(catalog.resolve("Size", PropertyRole::GroupBy).is_err());
        assert!(catalog.resolve("Size", PropertyRole::SortBy).is_ok());
        assert!(!catalog.names_for(PropertyRole::GroupBy).contains(&"Size"));
        assert_eq!(catalog.value(&item(), "Size").unwrap(), "142.6 MB");
    }

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(999), "999 B");
        assert_eq!(format_size(1000), "1 kB");
        assert_eq!(format_size(1_500_000_000), "1.5 GB");
    }

    #[test]
    fn test_format_relative_time() {
        let now = datetime!(2024-05-04 12:00 UTC);
        assert_eq!(
            format_relative_time(datetime!(2024-05-01 12:00 UTC), now),
            "3 days ago"
        );
        assert_eq!(format_relative_time(datetime!(2024-05-05 12:00 UTC), now), "now");
    }
}
