//! C3 method resolution order
//!
//! `linearize(C) = C ++ merge(L(P1), ..., L(Pn), [P1..Pn])`. The merge takes
//! the head of the first list that does not appear in the tail of any list,
//! appends it and strips it from every list it heads. A native parent's
//! linearization is just itself, so natives end the walk.

/// Merge parent linearizations; `None` if no consistent order exists
pub fn c3_merge<T: Copy + PartialEq>(mut sequences: Vec<Vec<T>>) -> Option<Vec<T>> {
    let mut result = Vec::new();
    loop {
        sequences.retain(|seq| !seq.is_empty());
        if sequences.is_empty() {
            return Some(result);
        }

        let candidate = sequences
            .iter()
            .map(|seq| seq[0])
            .find(|head| !sequences.iter().any(|seq| seq[1..].contains(head)))?;

        result.push(candidate);
        for seq in sequences.iter_mut() {
            if seq[0] == candidate {
                seq.remove(0);
            }
        }
    }
}

/// Linearize `class` given its ordered parents and each parent's own order
///
/// `parent_orders[i]` must be the linearization of `parents[i]`.
pub fn linearize<T: Copy + PartialEq>(
    class: T,
    parents: &[T],
    parent_orders: &[&[T]],
) -> Option<Vec<T>> {
    if parents.is_empty() {
        return Some(vec![class]);
    }

    let mut sequences: Vec<Vec<T>> = parent_orders.iter().map(|order| order.to_vec()).collect();
    sequences.push(parents.to_vec());

    let merged = c3_merge(sequences)?;
    if merged.contains(&class) {
        return None;
    }

    let mut order = Vec::with_capacity(merged.len() + 1);
    order.push(class);
    order.extend(merged);
    Some(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_parents() {
        assert_eq!(linearize('A', &[], &[]), Some(vec!['A']));
    }

    #[test]
    fn test_diamond() {
        let a = vec!['A'];
        let b = linearize('B', &['A'], &[&a]).unwrap();
        let c = linearize('C', &['A'], &[&a]).unwrap();
        let d = linearize('D', &['B', 'C'], &[&b, &c]).unwrap();
        assert_eq!(d, vec!['D', 'B', 'C', 'A']);
    }

    #[test]
    fn test_inconsistent_order() {
        let a = vec!['A'];
        let b = linearize('B', &['A'], &[&a]).unwrap();
        let c = linearize('C', &['A'], &[&a]).unwrap();
        let d = linearize('D', &['B', 'C'], &[&b, &c]).unwrap();
        let e = linearize('E', &['C', 'B'], &[&c, &b]).unwrap();
        assert_eq!(e, vec!['E', 'C', 'B', 'A']);
        assert_eq!(linearize('F', &['D', 'E'], &[&d, &e]), None);
    }

    #[test]
    fn test_native_leaf_terminates() {
        // 'N' stands for a native parent whose order is just itself
        let n = vec!['N'];
        let b = linearize('B', &['N'], &[&n]).unwrap();
        assert_eq!(b, vec!['B', 'N']);
        let c = linearize('C', &['B'], &[&b]).unwrap();
        assert_eq!(c, vec!['C', 'B', 'N']);
    }

    #[test]
    fn test_self_in_ancestry_rejected() {
        let a = vec!['A'];
        let b = linearize('B', &['A'], &[&a]).unwrap();
        assert_eq!(linearize('A', &['B'], &[&b]), None);
    }

    #[test]
    fn test_repeated_parent_rejected() {
        let a = vec!['A'];
        assert_eq!(linearize('B', &['A', 'A'], &[&a, &a]), None);
    }

    #[test]
    fn test_local_precedence_kept() {
        let x = vec!['X'];
        let y = vec!['Y'];
        let z = vec!['Z'];
        let order = linearize('C', &['Z', 'X', 'Y'], &[&z, &x, &y]).unwrap();
        assert_eq!(order, vec!['C', 'Z', 'X', 'Y']);
    }
}
