//! Synthetic keyed archives for tests
//!
//! Builds archive property lists object by object, mirroring the flattened
//! layout real files use: index 0 seeds the `$null` sentinel, every `push`
//! returns the UID reference of the stored object, and `build` assembles the
//! `$objects` / `$top` container around them.

use plist::{Dictionary, Uid, Value};

/// Seconds from the reference epoch to 2021-07-01T00:00:00Z
pub const MID_2021: f64 = 646_790_400.0;
/// Seconds from the reference epoch to 2023-07-01T00:00:00Z
pub const MID_2023: f64 = 709_862_400.0;

pub struct ArchiveBuilder {
    objects: Vec<Value>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        ArchiveBuilder {
            objects: vec![Value::String("$null".to_string())],
        }
    }

    pub fn uid(index: u64) -> Value {
        Value::Uid(Uid::new(index))
    }

    /// Store an object and return its UID reference
    pub fn push(&mut self, value: Value) -> Value {
        self.objects.push(value);
        Self::uid((self.objects.len() - 1) as u64)
    }

    pub fn push_string(&mut self, text: &str) -> Value {
        self.push(Value::String(text.to_string()))
    }

    pub fn push_object_list(&mut self, elements: Vec<Value>) -> Value {
        let mut dict = Dictionary::new();
        dict.insert("NS.objects".to_string(), Value::Array(elements));
        self.push(Value::Dictionary(dict))
    }

    pub fn push_keyed(&mut self, pairs: Vec<(Value, Value)>) -> Value {
        let (keys, values) = pairs.into_iter().unzip();
        let mut dict = Dictionary::new();
        dict.insert("NS.keys".to_string(), Value::Array(keys));
        dict.insert("NS.objects".to_string(), Value::Array(values));
        self.push(Value::Dictionary(dict))
    }

    pub fn push_time(&mut self, interval: f64) -> Value {
        let mut dict = Dictionary::new();
        dict.insert("NS.time".to_string(), Value::Real(interval));
        self.push(Value::Dictionary(dict))
    }

    pub fn push_presentity(&mut self, id: &str, service: &str) -> Value {
        let id_ref = self.push_string(id);
        let service_ref = self.push_string(service);
        let mut dict = Dictionary::new();
        dict.insert("ID".to_string(), id_ref);
        dict.insert("ServiceName".to_string(), service_ref);
        self.push(Value::Dictionary(dict))
    }

    /// Store a metadata object list with participant pairs at slots 4 and 6
    pub fn push_metadata(&mut self, pairs: &[(&str, &str)]) -> Value {
        let name_refs = pairs
            .iter()
            .map(|(name, _)| self.push_string(name))
            .collect::<Vec<_>>();
        let id_refs = pairs
            .iter()
            .map(|(_, id)| self.push_string(id))
            .collect::<Vec<_>>();
        let names = self.push_object_list(name_refs);
        let ids = self.push_object_list(id_refs);

        self.push_object_list(vec![
            Value::Integer(0u64.into()),
            Value::Integer(0u64.into()),
            Value::Integer(0u64.into()),
            Value::Integer(0u64.into()),
            names,
            Value::Integer(0u64.into()),
            ids,
        ])
    }

    /// Store the message sequence and wrap it in the root object list
    pub fn push_root(&mut self, messages: Vec<Value>) -> Value {
        let sequence = self.push_object_list(messages);
        self.push_object_list(vec![
            Value::Integer(0u64.into()),
            Value::Integer(0u64.into()),
            sequence,
        ])
    }

    pub fn build(self, metadata_ref: Value, root_ref: Value) -> Value {
        let mut top = Dictionary::new();
        top.insert("metadata".to_string(), metadata_ref);
        top.insert("root".to_string(), root_ref);

        let mut container = Dictionary::new();
        container.insert(
            "$archiver".to_string(),
            Value::String("NSKeyedArchiver".to_string()),
        );
        container.insert("$version".to_string(), Value::Integer(100_000u64.into()));
        container.insert("$objects".to_string(), Value::Array(self.objects));
        container.insert("$top".to_string(), Value::Dictionary(top));
        Value::Dictionary(container)
    }
}

fn message_object(fields: Vec<(&str, Value)>) -> Value {
    let mut dict = Dictionary::new();
    for (key, value) in fields {
        dict.insert(key.to_string(), value);
    }
    Value::Dictionary(dict)
}

/// A conversation with a plain SMS message and an attributed message whose
/// email-style sender threads by subject and carries one attachment
pub fn scenario_archive() -> Value {
    let mut builder = ArchiveBuilder::new();
    let metadata = builder.push_metadata(&[
        ("Alice", "+15550001111"),
        ("Bob", "+15551234567"),
        ("Friend", "e:friend@example.com"),
    ]);

    let bob = builder.push_presentity("+15551234567", "SMS");
    let time0 = builder.push_time(MID_2023);
    let guid0 = builder.push_string("guid-0");
    let hello = builder.push_string("Hello");
    let plain = message_object(vec![
        ("Time", time0),
        ("Sender", bob),
        ("GUID", guid0),
        ("OriginalMessage", hello),
    ]);
    let plain = builder.push(plain);

    let friend = builder.push_presentity("e:friend@example.com", "iMessage");
    let subject = builder.push_presentity("+15551234567", "iMessage");
    let time1 = builder.push_time(MID_2023 + 60.0);
    let guid1 = builder.push_string("guid-1");

    let transfer_key = builder.push_string("__kIMFileTransferGUIDAttributeName");
    let transfer_value = builder.push_string("ABCD-1");
    let name_key = builder.push_string("__kIMFilenameAttributeName");
    let name_value = builder.push_string("photo.jpg");
    let attachment_run = builder.push_keyed(vec![
        (transfer_key, transfer_value),
        (name_key, name_value),
    ]);

    let style_key = builder.push_string("__kIMMessagePartAttributeName");
    let style_value = builder.push(Value::Integer(0u64.into()));
    let style_run = builder.push_keyed(vec![(style_key, style_value)]);

    let attributes = builder.push_object_list(vec![attachment_run, style_run]);

    let mut wrapper = Dictionary::new();
    wrapper.insert(
        "NS.string".to_string(),
        Value::String("Check this out \u{fffc} nice".to_string()),
    );
    let body = builder.push(Value::Dictionary(wrapper));

    let mut attributed = Dictionary::new();
    attributed.insert("NSString".to_string(), body);
    attributed.insert("NSAttributes".to_string(), attributes);
    let message_text = builder.push(Value::Dictionary(attributed));

    let rich = message_object(vec![
        ("Time", time1),
        ("Sender", friend),
        ("Subject", subject),
        ("GUID", guid1),
        ("MessageText", message_text),
    ]);
    let rich = builder.push(rich);

    let root = builder.push_root(vec![plain, rich]);
    builder.build(metadata, root)
}

/// Two plain messages from the same sender, one per calendar year
pub fn multi_year_archive() -> Value {
    let mut builder = ArchiveBuilder::new();
    let metadata =
        builder.push_metadata(&[("Alice", "+15550001111"), ("Bob", "+15551234567")]);

    let bob = builder.push_presentity("+15551234567", "SMS");

    let time_old = builder.push_time(MID_2021);
    let guid_old = builder.push_string("guid-old");
    let text_old = builder.push_string("from 2021");
    let old = message_object(vec![
        ("Time", time_old),
        ("Sender", bob.clone()),
        ("GUID", guid_old),
        ("OriginalMessage", text_old),
    ]);
    let old = builder.push(old);

    let time_new = builder.push_time(MID_2023);
    let guid_new = builder.push_string("guid-new");
    let text_new = builder.push_string("from 2023");
    let new = message_object(vec![
        ("Time", time_new),
        ("Sender", bob),
        ("GUID", guid_new),
        ("OriginalMessage", text_new),
    ]);
    let new = builder.push(new);

    let root = builder.push_root(vec![old, new]);
    builder.build(metadata, root)
}

/// A single message whose `GUID` field is absent
pub fn missing_guid_archive() -> Value {
    let mut builder = ArchiveBuilder::new();
    let metadata =
        builder.push_metadata(&[("Alice", "+15550001111"), ("Bob", "+15551234567")]);

    let bob = builder.push_presentity("+15551234567", "SMS");
    let time = builder.push_time(MID_2023);
    let text = builder.push_string("no identity");
    let broken = message_object(vec![
        ("Time", time),
        ("Sender", bob),
        ("OriginalMessage", text),
    ]);
    let broken = builder.push(broken);

    let root = builder.push_root(vec![broken]);
    builder.build(metadata, root)
}
