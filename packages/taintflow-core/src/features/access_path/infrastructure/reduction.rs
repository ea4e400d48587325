//! Field-chain reductions applied during canonicalization

use crate::features::access_path::domain::AccessPathFragment;
use crate::shared::ir::Type;

/// Prefix of synthetic outer-class reference fields
const OUTER_THIS_PREFIX: &str = "this$";

/// Removes immediately repeating field groups, `f.g.f.g.x` becomes `f.g.x`
pub fn same_field_reduction(mut fragments: Vec<AccessPathFragment>) -> Vec<AccessPathFragment> {
    if fragments.len() < 2 {
        return fragments;
    }
    let mut bucket_start = fragments.len() as isize - 2;
    while bucket_start >= 0 {
        let start = bucket_start as usize;
        let repeat_pos = (start + 1..fragments.len())
            .find(|&i| fragments[i].field() == fragments[start].field());
        if let Some(repeat_pos) = repeat_pos {
            let repeat_len = repeat_pos - start;
            let repeats = (0..repeat_len).all(|i| {
                repeat_pos + i < fragments.len()
                    && fragments[start + i].field() == fragments[repeat_pos + i].field()
            });
            if repeats {
                fragments.drain(start + 1..=repeat_pos);
            }
        }
        bucket_start -= 1;
    }
    fragments
}

/// Folds `a.inner.this$0.c` back to `a.c`
///
/// A `this$N` field leads back to the enclosing instance. When that instance
/// is the base or an earlier fragment, the detour through the inner object is
/// dropped.
pub fn this_chain_reduction(
    base_type: Option<&Type>,
    mut fragments: Vec<AccessPathFragment>,
) -> Vec<AccessPathFragment> {
    let mut i = 0;
    while i < fragments.len() {
        if !fragments[i].field().name().starts_with(OUTER_THIS_PREFIX) {
            i += 1;
            continue;
        }
        let outer = fragments[i].field().ty().clone();
        let keep = if base_type == Some(&outer) {
            Some(0)
        } else {
            (0..i).rev().find(|&j| fragments[j].ty() == &outer).map(|j| j + 1)
        };
        match keep {
            Some(keep) => {
                fragments.drain(keep..=i);
                i = keep;
            }
            None => i += 1,
        }
    }
    fragments
}
