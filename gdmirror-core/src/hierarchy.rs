use std::collections::HashSet;

use crate::types::Folder;

/// Splits a set of folders into roots and non-roots.
///
/// A folder is a root of the set when its parent is not the id of any other
/// folder in the set. Relative order is preserved within both partitions.
pub fn root_folders(folders: Vec<Folder>) -> (Vec<Folder>, Vec<Folder>) {
    let ids: HashSet<&str> = folders.iter().map(|f| f.id.as_str()).collect();

    let mut roots = Vec::new();
    let mut non_roots = Vec::new();

    for folder in folders.iter() {
        let has_parent_in_set = folder
            .parent
            .as_deref()
            .is_some_and(|parent| ids.contains(parent));

        if has_parent_in_set {
            non_roots.push(folder.clone());
        } else {
            roots.push(folder.clone());
        }
    }

    (roots, non_roots)
}

/// Orders folders so that every folder precedes its descendants.
///
/// Works by repeated root extraction: each pass moves the current roots to
/// the output and recurses on the remainder, so siblings keep their input
/// order. Terminates because every pass removes at least one folder from a
/// finite, cycle-free set.
pub fn order_folders_on_hierarchy(mut folders: Vec<Folder>) -> Vec<Folder> {
    let mut ordered = Vec::with_capacity(folders.len());

    while !folders.is_empty() {
        let (roots, non_roots) = root_folders(folders);
        ordered.extend(roots);
        folders = non_roots;
    }

    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(id: &str, parent: &str) -> Folder {
        Folder {
            id: id.to_string(),
            parent: Some(parent.to_string()),
            ..Folder::default()
        }
    }

    #[test]
    fn root_folders_partitions_mixed_input() {
        let input = vec![
            folder("A", "Z"),
            folder("B", "A"),
            folder("C", "B"),
            folder("D", "Z"),
        ];

        let (roots, non_roots) = root_folders(input);

        assert_eq!(roots, vec![folder("A", "Z"), folder("D", "Z")]);
        assert_eq!(non_roots, vec![folder("B", "A"), folder("C", "B")]);
    }

    #[test]
    fn root_folders_with_roots_only() {
        let input = vec![folder("A", "Z"), folder("B", "X"), folder("C", "Y")];

        let (roots, non_roots) = root_folders(input.clone());

        assert_eq!(roots, input);
        assert!(non_roots.is_empty());
    }

    #[test]
    fn order_keeps_already_ordered_input_stable() {
        let input = vec![
            folder("A", "Z"),
            folder("B", "A"),
            folder("C", "B"),
            folder("D", "C"),
            folder("E", "B"),
            folder("F", "E"),
        ];

        let ordered = order_folders_on_hierarchy(input);

        assert_eq!(
            ordered,
            vec![
                folder("A", "Z"),
                folder("B", "A"),
                folder("C", "B"),
                folder("E", "B"),
                folder("D", "C"),
                folder("F", "E"),
            ]
        );
    }

    #[test]
    fn order_reverses_a_fully_inverted_chain() {
        let input = vec![folder("C", "B"), folder("B", "A"), folder("A", "Z")];

        let ordered = order_folders_on_hierarchy(input);

        assert_eq!(
            ordered,
            vec![folder("A", "Z"), folder("B", "A"), folder("C", "B")]
        );
    }

    #[test]
    fn order_is_a_permutation_of_its_input() {
        let input = vec![
            folder("D", "C"),
            folder("B", "A"),
            folder("A", "Z"),
            folder("C", "A"),
        ];

        let mut ordered = order_folders_on_hierarchy(input.clone());
        let mut expected = input;
        ordered.sort_by(|a, b| a.id.cmp(&b.id));
        expected.sort_by(|a, b| a.id.cmp(&b.id));

        assert_eq!(ordered, expected);
    }

    #[test]
    fn every_parent_precedes_its_child() {
        let input = vec![
            folder("F", "E"),
            folder("C", "B"),
            folder("E", "B"),
            folder("B", "A"),
            folder("A", "Z"),
            folder("D", "C"),
        ];

        let ordered = order_folders_on_hierarchy(input);

        let index_of = |id: &str| ordered.iter().position(|f| f.id == id).unwrap();
        for child in &ordered {
            if let Some(parent) = child.parent.as_deref() {
                if ordered.iter().any(|f| f.id == parent) {
                    assert!(index_of(parent) < index_of(&child.id));
                }
            }
        }
    }
}
