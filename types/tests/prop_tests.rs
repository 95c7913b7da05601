use std::collections::BTreeMap;

use proptest::prelude::*;

use elector_types::{
    AccountName, ChangeMap, ChangeRecord, ProducerPayload, PublicKey, RankKey, Score,
};

type Members = BTreeMap<AccountName, ProducerPayload>;

fn arb_key() -> impl Strategy<Value = RankKey> {
    (any::<bool>(), any::<u128>(), "[a-z1-5.]{1,12}").prop_map(|(active, score, name)| {
        RankKey::new(AccountName::new(name).unwrap(), Score::new(score), active)
    })
}

/// Memberships over a small id set; `None` leaves the id out.
fn arb_members() -> impl Strategy<Value = Members> {
    prop::collection::vec(prop::option::of(0u16..3), 6).prop_map(|slots| {
        slots
            .into_iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                let location = slot?;
                let payload = ProducerPayload {
                    public_key: PublicKey([i as u8; 32]),
                    url: format!("https://p{i}.example"),
                    location,
                };
                Some((AccountName::new(format!("p{i}")).unwrap(), payload))
            })
            .collect()
    })
}

/// The diff taking `from` to `to`.
fn diff(from: &Members, to: &Members) -> ChangeMap {
    let mut map = ChangeMap::new(to.len() as u32);
    for (id, payload) in to {
        match from.get(id) {
            None => map.record(id.clone(), ChangeRecord::Add(payload.clone())).unwrap(),
            Some(old) if old != payload => {
                map.record(id.clone(), ChangeRecord::Modify(payload.clone())).unwrap()
            }
            Some(_) => {}
        }
    }
    for id in from.keys().filter(|id| !to.contains_key(*id)) {
        map.record(id.clone(), ChangeRecord::Delete).unwrap();
    }
    map
}

proptest! {
    /// Merging successive diffs and applying the result once lands on the
    /// same membership as applying each diff in turn.
    #[test]
    fn merged_diffs_replay_like_sequential(states in prop::collection::vec(arb_members(), 2..8)) {
        let mut merged = ChangeMap::default();
        let mut stepwise = states[0].clone();
        for pair in states.windows(2) {
            let step = diff(&pair[0], &pair[1]);
            step.apply_to(&mut stepwise).unwrap();
            merged.merge(&step).unwrap();
        }

        let mut replayed = states[0].clone();
        merged.apply_to(&mut replayed).unwrap();
        prop_assert_eq!(&replayed, &stepwise);
        prop_assert_eq!(&replayed, states.last().unwrap());
        prop_assert_eq!(merged.resulting_size as usize, replayed.len());
    }

    /// The index byte encoding orders exactly like the in-memory comparator.
    #[test]
    fn rank_key_bytes_preserve_order(a in arb_key(), b in arb_key()) {
        prop_assert_eq!(a.to_bytes().cmp(&b.to_bytes()), a.cmp(&b));
    }

    /// Byte encoding roundtrip.
    #[test]
    fn rank_key_bytes_roundtrip(k in arb_key()) {
        prop_assert_eq!(RankKey::from_bytes(&k.to_bytes()).unwrap(), k);
    }

    /// Active keys always rank ahead of inactive ones.
    #[test]
    fn active_ranks_ahead(a in arb_key(), b in arb_key()) {
        if a.active && !b.active {
            prop_assert!(a < b);
        }
    }

    /// RankKey bincode roundtrip (the stored marker format).
    #[test]
    fn rank_key_bincode_roundtrip(k in arb_key()) {
        let encoded = bincode::serialize(&k).unwrap();
        let decoded: RankKey = bincode::deserialize(&encoded).unwrap();
        prop_assert_eq!(decoded, k);
    }
}
