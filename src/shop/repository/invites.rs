use std::sync::Arc;

use rand::{thread_rng, Rng};
use serde_json::Value;

use crate::shop::error::{ShopError, ShopResult};
use crate::shop::repository::{invites_collection, list_key, read_string};
use crate::shop::types::LIST_ORDER_SENTINEL;
use crate::store::{
    run_transaction, DocumentKey, DocumentStore, FieldPath, FieldValue, WriteData,
};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Single-use invite codes under `invites/{code}`.
#[derive(Clone)]
pub struct InviteRepository {
    store: Arc<dyn DocumentStore>,
    code_length: usize,
    max_attempts: u32,
}

impl InviteRepository {
    pub fn new(store: Arc<dyn DocumentStore>, code_length: usize, max_attempts: u32) -> Self {
        Self {
            store,
            code_length,
            max_attempts,
        }
    }

    /// Mints a code for `list_id` on behalf of `uid`.
    ///
    /// Returns `None` when `uid` is not a member of the list or every attempt
    /// collided with a live invite.
    pub async fn create_for_list(&self, uid: &str, list_id: &str) -> ShopResult<Option<String>> {
        let list = self.store.get(&list_key(list_id)?).await?;
        let is_member = list
            .data()
            .and_then(|fields| fields.get("memberIds"))
            .and_then(Value::as_array)
            .is_some_and(|members| members.iter().any(|member| member.as_str() == Some(uid)));
        if !is_member {
            log::debug!("refusing invite for list {list_id}: caller is not a member");
            return Ok(None);
        }

        for _ in 0..self.max_attempts {
            let code = generate_code(self.code_length);
            let key = DocumentKey::in_collection(&invites_collection(), &code)?;
            if self.store.get(&key).await?.exists() {
                continue;
            }

            let mut data = WriteData::new();
            data.insert("listId".into(), FieldValue::from(list_id));
            data.insert("createdBy".into(), FieldValue::from(uid));
            data.insert("createdAt".into(), FieldValue::server_timestamp());
            self.store.set(&key, data, false).await?;
            return Ok(Some(code));
        }

        log::warn!(
            "could not mint an unused invite code for list {list_id} in {} attempts",
            self.max_attempts
        );
        Ok(None)
    }

    /// Adds `uid` to the invited list and consumes the invite atomically.
    ///
    /// The code is trimmed and upper-cased first; a blank code returns `None`.
    pub async fn join_by_code(&self, uid: &str, raw_code: &str) -> ShopResult<Option<String>> {
        let code = normalize_code(raw_code);
        if code.is_empty() {
            return Ok(None);
        }
        let invite = DocumentKey::in_collection(&invites_collection(), &code)?;
        let member_ids = FieldPath::from_dot_separated("memberIds")?;
        let position = FieldPath::new(["orderBy", uid])?;

        let list_id = run_transaction(Arc::clone(&self.store), |transaction| {
            let invite = invite.clone();
            let code = code.clone();
            let member_ids = member_ids.clone();
            let position = position.clone();
            let uid = uid.to_string();
            async move {
                let snapshot = transaction.get(&invite).await?;
                let fields = snapshot
                    .data()
                    .ok_or_else(|| ShopError::InviteNotFound(code.clone()))?;
                let list_id = read_string(fields, "listId")
                    .ok_or_else(|| ShopError::InvalidInvite(code.clone()))?;

                transaction.update(
                    list_key(&list_id)?,
                    vec![
                        (member_ids, FieldValue::array_union([uid])),
                        (position, FieldValue::from(LIST_ORDER_SENTINEL)),
                    ],
                );
                transaction.delete(invite);
                Ok::<_, ShopError>(list_id)
            }
        })
        .await?;

        log::debug!("joined list {list_id} with invite {code}");
        Ok(Some(list_id))
    }
}

pub(crate) fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

fn generate_code(length: usize) -> String {
    let mut rng = thread_rng();
    (0..length)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shop::repository::ListRepository;
    use crate::store::InMemoryDocumentStore;
    use serde_json::json;

    struct Fixture {
        memory: InMemoryDocumentStore,
        lists: ListRepository,
        invites: InviteRepository,
    }

    fn fixture(code_length: usize) -> Fixture {
        let memory = InMemoryDocumentStore::new();
        let store: Arc<dyn DocumentStore> = Arc::new(memory.clone());
        Fixture {
            lists: ListRepository::new(Arc::clone(&store), 450),
            invites: InviteRepository::new(store, code_length, 5),
            memory,
        }
    }

    #[test]
    fn codes_are_uppercase_alphanumeric() {
        let code = generate_code(6);
        assert_eq!(code.len(), 6);
        assert!(code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert_eq!(normalize_code("  ab12cd \n"), "AB12CD");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn only_members_can_mint_codes() {
        let fixture = fixture(6);
        let list = fixture.lists.create("owner", "Mökki", None, 0).await.unwrap();

        let code = fixture.invites.create_for_list("owner", list.id()).await.unwrap();
        assert!(code.is_some());
        let refused = fixture
            .invites
            .create_for_list("stranger", list.id())
            .await
            .unwrap();
        assert!(refused.is_none());
        let missing = fixture
            .invites
            .create_for_list("owner", "missing")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn exhausted_attempts_return_none() {
        let fixture = fixture(1);
        let list = fixture.lists.create("owner", "Mökki", None, 0).await.unwrap();
        for symbol in CODE_ALPHABET {
            let key = DocumentKey::in_collection(
                &invites_collection(),
                &(*symbol as char).to_string(),
            )
            .unwrap();
            let mut data = WriteData::new();
            data.insert("listId".into(), FieldValue::from("other"));
            fixture.memory.set(&key, data, false).await.unwrap();
        }

        let code = fixture.invites.create_for_list("owner", list.id()).await.unwrap();
        assert!(code.is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn join_adds_member_and_consumes_invite() {
        let fixture = fixture(6);
        let list = fixture.lists.create("owner", "Mökki", None, 0).await.unwrap();
        let code = fixture
            .invites
            .create_for_list("owner", list.id())
            .await
            .unwrap()
            .unwrap();

        let joined = fixture
            .invites
            .join_by_code("guest", &format!(" {} ", code.to_lowercase()))
            .await
            .unwrap();
        assert_eq!(joined.as_deref(), Some(list.id()));

        let stored = fixture.memory.get(&list).await.unwrap();
        let fields = stored.data().unwrap();
        assert_eq!(fields["memberIds"], json!(["owner", "guest"]));
        assert_eq!(fields["orderBy"]["guest"], json!(LIST_ORDER_SENTINEL));
        assert_eq!(fields["orderBy"]["owner"], json!(0));

        let err = fixture
            .invites
            .join_by_code("guest", &code)
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::InviteNotFound(_)));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn malformed_invite_is_rejected_without_writes() {
        let fixture = fixture(6);
        let key = DocumentKey::in_collection(&invites_collection(), "BROKEN").unwrap();
        let mut data = WriteData::new();
        data.insert("listId".into(), FieldValue::from(5_i64));
        fixture.memory.set(&key, data, false).await.unwrap();

        let err = fixture
            .invites
            .join_by_code("guest", "broken")
            .await
            .unwrap_err();
        assert_eq!(err.code_str(), "shop/invalid-invite");
        assert!(fixture.memory.get(&key).await.unwrap().exists());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn blank_code_is_ignored() {
        let fixture = fixture(6);
        assert_eq!(fixture.invites.join_by_code("guest", "   ").await.unwrap(), None);
        assert_eq!(fixture.memory.commit_count(), 0);
    }
}
