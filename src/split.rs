use crate::{Error, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::collections::BTreeMap;

/// Disjoint training and validation indices covering a whole dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub valid: Vec<usize>,
}

/// Partitions `0..labels.len()` into training and validation indices while
/// preserving the proportion of each class in both subsets.
///
/// The validation subset holds `ceil(val_size * n)` items. Each class gets its
/// share of them by largest remainder, ties going to the smaller label, and
/// the members of a class are drawn with a generator seeded by `seed`. Both
/// index lists are returned shuffled.
pub fn stratified_split(labels: &[u8], val_size: f64, seed: u64) -> Result<Split> {
    if !(val_size > 0.0 && val_size < 1.0) {
        return Err(Error::InvalidValSize(val_size));
    }

    let total = labels.len();
    let num_valid = (val_size * total as f64).ceil() as usize;
    let num_train = total - num_valid;

    if num_valid == 0 || num_train == 0 {
        return Err(Error::EmptySplit {
            total,
            train: num_train,
            valid: num_valid,
        });
    }

    let mut classes: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
    for (index, label) in labels.iter().enumerate() {
        classes.entry(*label).or_default().push(index);
    }

    if let Some((class, members)) = classes.iter().find(|(_, members)| members.len() < 2) {
        return Err(Error::ClassTooSmall {
            class: *class,
            count: members.len(),
        });
    }

    let num_classes = classes.len();
    for (subset, size) in [("train", num_train), ("valid", num_valid)] {
        if size < num_classes {
            return Err(Error::SplitSmallerThanClasses {
                subset,
                size,
                num_classes,
            });
        }
    }

    let counts: Vec<usize> = classes.values().map(Vec::len).collect();
    let quotas = allocate(&counts, num_valid);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(num_train);
    let mut valid = Vec::with_capacity(num_valid);

    for (mut members, quota) in classes.into_values().zip(quotas) {
        members.shuffle(&mut rng);
        let (class_valid, class_train) = members.split_at(quota);
        valid.extend_from_slice(class_valid);
        train.extend_from_slice(class_train);
    }

    train.shuffle(&mut rng);
    valid.shuffle(&mut rng);

    Ok(Split { train, valid })
}

/// Distributes `amount` over the classes proportionally to `counts`.
fn allocate(counts: &[usize], amount: usize) -> Vec<usize> {
    let total: usize = counts.iter().sum();

    let mut quotas = Vec::with_capacity(counts.len());
    let mut remainders = Vec::with_capacity(counts.len());
    for (position, count) in counts.iter().enumerate() {
        let exact = count * amount;
        quotas.push(exact / total);
        remainders.push((exact % total, position));
    }

    let missing = amount - quotas.iter().sum::<usize>();
    // Stable sort keeps the smaller label first among equal remainders.
    remainders.sort_by(|a, b| b.0.cmp(&a.0));
    for (_, position) in remainders.into_iter().take(missing) {
        quotas[position] += 1;
    }

    quotas
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Class `c` has `20 * (c + 1)` members, 1100 items in total.
    fn skewed_labels() -> Vec<u8> {
        (0..10u8)
            .flat_map(|class| std::iter::repeat(class).take(20 * (class as usize + 1)))
            .collect()
    }

    fn count(labels: &[u8], indices: &[usize], class: u8) -> usize {
        indices.iter().filter(|i| labels[**i] == class).count()
    }

    #[test]
    fn validation_size_is_rounded_up() {
        let labels = skewed_labels();

        let split = stratified_split(&labels, 0.15, 1234).unwrap();

        let expected = (0.15 * labels.len() as f64).ceil() as usize;
        assert_eq!(split.valid.len(), expected);
        assert_eq!(split.train.len(), labels.len() - expected);
    }

    #[test]
    fn every_index_lands_in_exactly_one_subset() {
        let labels = skewed_labels();

        let split = stratified_split(&labels, 0.15, 1234).unwrap();

        let train: HashSet<_> = split.train.iter().copied().collect();
        let valid: HashSet<_> = split.valid.iter().copied().collect();
        assert_eq!(train.len(), split.train.len());
        assert_eq!(valid.len(), split.valid.len());
        assert!(train.is_disjoint(&valid));
        assert_eq!(train.len() + valid.len(), labels.len());
        assert!(train.union(&valid).all(|index| *index < labels.len()));
    }

    #[test]
    fn class_proportions_are_preserved() {
        let labels = skewed_labels();

        let split = stratified_split(&labels, 0.25, 3).unwrap();

        for class in 0..10u8 {
            let members = 20 * (class as usize + 1);
            assert_eq!(count(&labels, &split.valid, class), members / 4);
            assert_eq!(count(&labels, &split.train, class), members - members / 4);
        }
    }

    #[test]
    fn uneven_classes_stay_within_one_item() {
        let labels = skewed_labels();
        let val_size = 0.15;

        let split = stratified_split(&labels, val_size, 99).unwrap();

        for class in 0..10u8 {
            let members = 20.0 * (class as f64 + 1.0);
            let valid = count(&labels, &split.valid, class) as f64;
            assert!((valid - members * val_size).abs() <= 1.0);
        }
    }

    #[test]
    fn same_seed_gives_same_split() {
        let labels = skewed_labels();

        let first = stratified_split(&labels, 0.15, 42).unwrap();
        let second = stratified_split(&labels, 0.15, 42).unwrap();
        let other = stratified_split(&labels, 0.15, 43).unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn rejects_out_of_range_val_size() {
        let labels = skewed_labels();

        for val_size in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
            assert!(matches!(
                stratified_split(&labels, val_size, 0),
                Err(Error::InvalidValSize(_))
            ));
        }
    }

    #[test]
    fn rejects_empty_dataset() {
        assert!(matches!(
            stratified_split(&[], 0.15, 0),
            Err(Error::EmptySplit { total: 0, .. })
        ));
    }

    #[test]
    fn rejects_singleton_class() {
        let labels = [0, 0, 0, 1, 1, 1, 2];

        assert!(matches!(
            stratified_split(&labels, 0.5, 0),
            Err(Error::ClassTooSmall { class: 2, count: 1 })
        ));
    }

    #[test]
    fn rejects_validation_smaller_than_class_count() {
        let labels: Vec<u8> = (0..10u8).flat_map(|class| [class; 3]).collect();

        assert!(matches!(
            stratified_split(&labels, 0.1, 0),
            Err(Error::SplitSmallerThanClasses {
                subset: "valid",
                size: 3,
                num_classes: 10,
            })
        ));
    }

    #[test]
    fn allocation_sums_to_requested_amount() {
        assert_eq!(allocate(&[5, 5, 5], 4), vec![2, 1, 1]);
        assert_eq!(allocate(&[10, 30], 8), vec![2, 6]);
        assert_eq!(allocate(&[1, 1, 1, 1], 0), vec![0, 0, 0, 0]);
    }
}
