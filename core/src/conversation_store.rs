/// Conversation storage: persists conversation rows in sled
use crate::error::{ChatError, Result};
use crate::models::{Conversation, UserSession};
use tracing::debug;
use uuid::Uuid;

pub struct ConversationStore {
    rows: sled::Tree,
    /// `<business>:<courier>` → conversation id
    pairs: sled::Tree,
}

fn pair_key(business_id: Uuid, courier_id: Uuid) -> String {
    format!("{}:{}", business_id, courier_id)
}

impl ConversationStore {
    pub fn new(db: &sled::Db) -> Result<Self> {
        let rows = db
            .open_tree("conversations")
            .map_err(|e| ChatError::storage("open conversations tree", e))?;
        let pairs = db
            .open_tree("conversation_pairs")
            .map_err(|e| ChatError::storage("open conversation pairs", e))?;
        Ok(Self { rows, pairs })
    }

    fn put_row(&self, c: &Conversation) -> Result<()> {
        let val = serde_json::to_vec(c)?;
        self.rows
            .insert(c.id.as_bytes(), val)
            .map_err(|e| ChatError::storage("save conversation", e))?;
        Ok(())
    }

    /// Insert `c` unless its business/courier pair already has a row.
    /// Returns the row owning the pair and whether it is the one just added.
    ///
    /// The row is written before the pair key is claimed, so the index never
    /// points at a missing row. A caller that loses the claim removes its row
    /// and returns the winner's.
    pub fn create_or_get(&self, c: Conversation) -> Result<(Conversation, bool)> {
        let key = pair_key(c.business_id, c.courier_id);
        loop {
            if let Some(existing) = self.find_pair(c.business_id, c.courier_id)? {
                return Ok((existing, false));
            }

            self.put_row(&c)?;
            let claim = self
                .pairs
                .compare_and_swap(
                    key.as_bytes(),
                    None::<&[u8]>,
                    Some(c.id.as_bytes().to_vec()),
                )
                .map_err(|e| ChatError::storage("claim conversation pair", e))?;

            match claim {
                Ok(()) => return Ok((c, true)),
                Err(_) => {
                    debug!("pair {} claimed concurrently, dropping {}", key, c.id);
                    self.rows
                        .remove(c.id.as_bytes())
                        .map_err(|e| ChatError::storage("drop duplicate conversation", e))?;
                }
            }
        }
    }

    pub fn get(&self, id: Uuid) -> Result<Option<Conversation>> {
        match self
            .rows
            .get(id.as_bytes())
            .map_err(|e| ChatError::storage("get conversation", e))?
        {
            Some(val) => Ok(Some(serde_json::from_slice(&val)?)),
            None => Ok(None),
        }
    }

    pub fn find_pair(&self, business_id: Uuid, courier_id: Uuid) -> Result<Option<Conversation>> {
        let Some(id) = self
            .pairs
            .get(pair_key(business_id, courier_id).as_bytes())
            .map_err(|e| ChatError::storage("find conversation pair", e))?
        else {
            return Ok(None);
        };
        let id = Uuid::from_slice(&id)
            .map_err(|e| ChatError::storage("corrupt conversation pair index", e))?;
        self.get(id)
    }

    /// Conversations `session` takes part in and has not hidden.
    pub fn list_visible(&self, session: &UserSession) -> Result<Vec<Conversation>> {
        let mut out = Vec::new();
        for entry in self.rows.iter() {
            let (_, val) = entry.map_err(|e| ChatError::storage("scan conversations", e))?;
            let c: Conversation = serde_json::from_slice(&val)?;
            if c.is_participant(session) && !c.is_hidden_for(session.role) {
                out.push(c);
            }
        }
        Ok(out)
    }

    /// Apply `f` to the current row and swap it in atomically. If another
    /// writer got there first, `f` runs again on the fresh row, so concurrent
    /// updates of different fields never undo each other.
    pub fn update<F>(&self, id: Uuid, mut f: F) -> Result<Conversation>
    where
        F: FnMut(&mut Conversation) -> Result<()>,
    {
        loop {
            let current = self
                .rows
                .get(id.as_bytes())
                .map_err(|e| ChatError::storage("get conversation", e))?
                .ok_or_else(|| ChatError::NotFound(format!("conversation {}", id)))?;
            let mut c: Conversation = serde_json::from_slice(&current)?;
            f(&mut c)?;
            let next = serde_json::to_vec(&c)?;

            let swapped = self
                .rows
                .compare_and_swap(id.as_bytes(), Some(&*current), Some(next))
                .map_err(|e| ChatError::storage("update conversation", e))?;
            match swapped {
                Ok(()) => return Ok(c),
                Err(_) => debug!("conversation {} changed underneath, retrying", id),
            }
        }
    }

    pub fn count(&self) -> usize {
        self.rows.len()
    }
}

impl Clone for ConversationStore {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows.clone(),
            pairs: self.pairs.clone(),
        }
    }
}
