/// Message persistence: chat history stored in sled
///
/// Keys are `<conversation>:<created_at µs>:<message id>`, so a prefix scan
/// over one conversation yields its messages oldest first. A second tree maps
/// message id to that key for single-row updates.
use crate::backend::HistoryQuery;
use crate::error::{ChatError, Result};
use crate::models::Message;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub struct MessageStore {
    messages: sled::Tree,
    index: sled::Tree,
}

fn conversation_prefix(conversation_id: Uuid) -> String {
    format!("{}:", conversation_id)
}

fn message_key(conversation_id: Uuid, created_at: DateTime<Utc>, id: Uuid) -> String {
    let micros = created_at.timestamp_micros().max(0);
    format!("{}:{:020}:{}", conversation_id, micros, id)
}

fn decode(value: &[u8]) -> Result<Message> {
    serde_json::from_slice(value).map_err(ChatError::Serialization)
}

impl MessageStore {
    pub fn new(db: &sled::Db) -> Result<Self> {
        let messages = db
            .open_tree("messages")
            .map_err(|e| ChatError::storage("open messages tree", e))?;
        let index = db
            .open_tree("message_index")
            .map_err(|e| ChatError::storage("open message index", e))?;
        Ok(Self { messages, index })
    }

    /// Save a message, replacing any row with the same id.
    pub fn save(&self, msg: &Message) -> Result<()> {
        let key = message_key(msg.conversation_id, msg.created_at, msg.id);
        let value = serde_json::to_vec(msg)?;

        self.messages
            .insert(key.as_bytes(), value)
            .map_err(|e| ChatError::storage("save message", e))?;
        self.index
            .insert(msg.id.as_bytes(), key.as_bytes())
            .map_err(|e| ChatError::storage("index message", e))?;
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Result<Option<Message>> {
        let Some(key) = self
            .index
            .get(id.as_bytes())
            .map_err(|e| ChatError::storage("lookup message", e))?
        else {
            return Ok(None);
        };
        match self
            .messages
            .get(key)
            .map_err(|e| ChatError::storage("get message", e))?
        {
            Some(value) => Ok(Some(decode(&value)?)),
            None => Ok(None),
        }
    }

    /// History of one conversation, oldest first.
    pub fn list(&self, conversation_id: Uuid, query: HistoryQuery) -> Result<Vec<Message>> {
        let prefix = conversation_prefix(conversation_id);
        let entries: Box<dyn DoubleEndedIterator<Item = sled::Result<(sled::IVec, sled::IVec)>>> =
            match query.before {
                Some((created_at, id)) => {
                    let end = message_key(conversation_id, created_at, id);
                    Box::new(self.messages.range(prefix.as_bytes()..end.as_bytes()))
                }
                None => Box::new(self.messages.scan_prefix(prefix.as_bytes())),
            };

        let mut messages = Vec::new();
        for entry in entries.rev() {
            if query.limit.is_some_and(|limit| messages.len() >= limit) {
                break;
            }
            let (_, value) = entry.map_err(|e| ChatError::storage("scan messages", e))?;
            messages.push(decode(&value)?);
        }

        messages.reverse();
        Ok(messages)
    }

    pub fn latest(&self, conversation_id: Uuid) -> Result<Option<Message>> {
        let prefix = conversation_prefix(conversation_id);
        match self.messages.scan_prefix(prefix.as_bytes()).next_back() {
            Some(entry) => {
                let (_, value) = entry.map_err(|e| ChatError::storage("latest message", e))?;
                Ok(Some(decode(&value)?))
            }
            None => Ok(None),
        }
    }

    pub fn count_unread(&self, conversation_id: Uuid, reader_id: Uuid) -> Result<u64> {
        let mut count = 0;
        for msg in self.list(conversation_id, HistoryQuery::all())? {
            if msg.sender_id != reader_id && !msg.is_read {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Mark every unread message from the other side as read. Returns the
    /// rows that changed.
    pub fn mark_read(&self, conversation_id: Uuid, reader_id: Uuid) -> Result<Vec<Message>> {
        let mut changed = Vec::new();
        for mut msg in self.list(conversation_id, HistoryQuery::all())? {
            if msg.sender_id != reader_id && !msg.is_read {
                msg.is_read = true;
                self.save(&msg)?;
                changed.push(msg);
            }
        }
        Ok(changed)
    }

    pub fn mark_one_read(&self, id: Uuid, reader_id: Uuid) -> Result<Option<Message>> {
        match self.get(id)? {
            Some(mut msg) if msg.sender_id != reader_id && !msg.is_read => {
                msg.is_read = true;
                self.save(&msg)?;
                Ok(Some(msg))
            }
            _ => Ok(None),
        }
    }

    pub fn count(&self) -> usize {
        self.messages.len()
    }
}

impl Clone for MessageStore {
    fn clone(&self) -> Self {
        Self {
            messages: self.messages.clone(),
            index: self.index.clone(),
        }
    }
}
