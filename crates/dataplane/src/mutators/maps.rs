use std::collections::BTreeMap;

/// Forces every desired key to its desired value. Keys not mentioned in `desired` are kept.
///
/// A missing map is only created when there is something to put in it. Returns whether
/// anything changed.
pub fn enforce_map_contains(
    actual: &mut Option<BTreeMap<String, String>>,
    desired: &BTreeMap<String, String>,
) -> bool {
    if desired.is_empty() {
        return false;
    }

    let actual = actual.get_or_insert_with(BTreeMap::new);
    let mut changed = false;
    for (key, value) in desired {
        if actual.get(key) != Some(value) {
            actual.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_enforce_map_contains_keeps_foreign_keys() {
        let mut actual = Some(map(&[("foo", "bar")]));
        assert!(enforce_map_contains(&mut actual, &map(&[("baz", "qux")])));
        assert_eq!(actual, Some(map(&[("foo", "bar"), ("baz", "qux")])));

        assert!(!enforce_map_contains(&mut actual, &map(&[("baz", "qux")])));

        assert!(enforce_map_contains(&mut actual, &map(&[("foo", "override")])));
        assert_eq!(actual.unwrap()["foo"], "override");
    }

    #[test]
    fn test_enforce_map_contains_does_not_create_empty_maps() {
        let mut actual = None;
        assert!(!enforce_map_contains(&mut actual, &BTreeMap::new()));
        assert_eq!(actual, None);
    }
}
