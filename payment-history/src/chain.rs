//! Root-to-leaf event chains
//!
//! # Algorithm
//!
//! 1. Index the ledger ([`EventRegistry`])
//! 2. Seed one chain per root event
//! 3. While some chain ends in an event with children, replace that chain
//!    with one branch per child
//! 4. The survivors are exactly the root-to-leaf paths of the forest
//!
//! ```text
//! R ─┬─ C1 ── RC1        chains: [R, C1, RC1]
//!    └─ C2                       [R, C2]
//! ```
//!
//! Chains hold arena indices, so branching copies a short `Vec<usize>` and
//! never touches the events themselves.

use crate::{
    registry::{EventIndex, EventRegistry},
    types::PaymentEvent,
    Result,
};

/// One root-to-leaf path through the event forest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventChain {
    indices: Vec<EventIndex>,
}

impl EventChain {
    /// Chain containing only `root`
    pub fn seed(root: EventIndex) -> Self {
        Self {
            indices: vec![root],
        }
    }

    /// New chain extending this one by `child`; `self` is left untouched
    pub fn branch(&self, child: EventIndex) -> Self {
        let mut indices = Vec::with_capacity(self.indices.len() + 1);
        indices.extend_from_slice(&self.indices);
        indices.push(child);
        Self { indices }
    }

    /// Arena positions, root first
    pub fn indices(&self) -> &[EventIndex] {
        &self.indices
    }

    /// Root position
    pub fn root(&self) -> EventIndex {
        self.indices[0]
    }

    /// Leaf position
    pub fn last(&self) -> EventIndex {
        self.indices[self.indices.len() - 1]
    }

    /// Number of events in the chain
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Always false; a chain holds at least its root
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Events root → leaf
    pub fn events<'a>(
        &'a self,
        registry: &'a EventRegistry<'a>,
    ) -> impl Iterator<Item = &'a PaymentEvent> + 'a {
        self.indices.iter().map(move |&i| registry.event(i))
    }

    /// Strictly sequential fold, root → leaf
    ///
    /// Reordering events inside a chain changes the financial result, so no
    /// reduction primitive that could split or reorder the chain is offered.
    pub fn fold<T, F>(&self, registry: &EventRegistry<'_>, init: T, mut f: F) -> Result<T>
    where
        F: FnMut(T, EventIndex, &PaymentEvent) -> Result<T>,
    {
        let mut acc = init;
        for &index in &self.indices {
            acc = f(acc, index, registry.event(index))?;
        }
        Ok(acc)
    }
}

/// Expand the registry's forest into root-to-leaf chains
///
/// Chains come out grouped by root in input order, and branches follow the
/// input order of children. Guids are unique and every event has at most one
/// parent, so the walk from the roots cannot revisit an event.
pub fn build_chains(registry: &EventRegistry<'_>) -> Vec<EventChain> {
    let mut chains: Vec<EventChain> = registry
        .roots()
        .iter()
        .map(|&root| EventChain::seed(root))
        .collect();

    loop {
        let mut expanded = false;
        let mut next = Vec::with_capacity(chains.len());

        for chain in chains {
            let leaf = registry.event(chain.last());
            let children = registry.child_indices(leaf);

            if children.is_empty() {
                next.push(chain);
                continue;
            }

            expanded = true;
            next.extend(children.iter().map(|&child| chain.branch(child)));
        }

        chains = next;
        if !expanded {
            break;
        }
    }

    tracing::debug!(chains = chains.len(), "built event chains");
    chains
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        money::Money,
        types::{Currency, InstrumentGuid, TransactionType},
    };
    use rust_decimal::Decimal;

    fn event(guid: &str, kind: TransactionType, parent: Option<&str>) -> PaymentEvent {
        let event = PaymentEvent::new(
            guid,
            kind,
            Money::new(Decimal::from(10), Currency::USD),
            &InstrumentGuid::new("card"),
        );
        match parent {
            Some(parent) => event.with_parent_guid(parent),
            None => event,
        }
    }

    fn guids(chain: &EventChain, registry: &EventRegistry<'_>) -> Vec<String> {
        chain.events(registry).map(|e| e.guid.to_string()).collect()
    }

    #[test]
    fn test_one_chain_per_leaf() {
        let events = vec![
            event("r1", TransactionType::Reserve, None),
            event("c1", TransactionType::Charge, Some("r1")),
            event("c2", TransactionType::Charge, Some("r1")),
            event("rc1", TransactionType::ReverseCharge, Some("c1")),
            event("r2", TransactionType::Reserve, None),
        ];
        let registry = EventRegistry::index(&events).unwrap();
        let chains = build_chains(&registry);

        let paths: Vec<Vec<String>> = chains.iter().map(|c| guids(c, &registry)).collect();
        assert_eq!(
            paths,
            vec![
                vec!["r1", "c1", "rc1"],
                vec!["r1", "c2"],
                vec!["r2"],
            ]
        );
    }

    #[test]
    fn test_branch_leaves_parent_untouched() {
        let parent = EventChain::seed(0);
        let child = parent.branch(3);
        assert_eq!(parent.indices(), &[0]);
        assert_eq!(child.indices(), &[0, 3]);
        assert_eq!(child.root(), 0);
        assert_eq!(child.last(), 3);
    }

    #[test]
    fn test_unreachable_events_excluded() {
        let events = vec![
            event("r1", TransactionType::Reserve, None),
            event("orphan", TransactionType::Charge, Some("gone")),
            event("orphan-child", TransactionType::Credit, Some("orphan")),
        ];
        let registry = EventRegistry::index(&events).unwrap();
        let chains = build_chains(&registry);

        assert_eq!(chains.len(), 1);
        assert_eq!(guids(&chains[0], &registry), vec!["r1"]);
    }

    #[test]
    fn test_empty_ledger_has_no_chains() {
        let registry = EventRegistry::index(&[]).unwrap();
        assert!(build_chains(&registry).is_empty());
    }

    #[test]
    fn test_fold_runs_root_to_leaf() {
        let events = vec![
            event("c1", TransactionType::Charge, Some("r1")),
            event("r1", TransactionType::Reserve, None),
            event("rc1", TransactionType::ReverseCharge, Some("c1")),
        ];
        let registry = EventRegistry::index(&events).unwrap();
        let chains = build_chains(&registry);

        let order = chains[0]
            .fold(&registry, Vec::new(), |mut seen, index, event| {
                seen.push((index, event.transaction_type));
                Ok(seen)
            })
            .unwrap();
        assert_eq!(
            order,
            vec![
                (1, TransactionType::Reserve),
                (0, TransactionType::Charge),
                (2, TransactionType::ReverseCharge),
            ]
        );
    }
}
