//! Outlook MSG reader.
//!
//! Opens the OLE2 compound file, walks the message, recipient and attachment
//! storages, and fills a [`SourceMessage`]. Unreadable individual properties
//! are logged and left absent; only an unreadable container is an error.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{ConvertError, Result};
use crate::model::attachment::{Payload, SourceAttachment};
use crate::model::message::{FieldValue, RecipientKind, SourceMessage, SourceRecipient};

use super::property::{decode_utf16, read_stream, PropertyStorage, StorageKind, PT_BINARY};
use super::rtf::decompress_rtf;

const RECIP_PREFIX: &str = "__recip_version1.0_#";
const ATTACH_PREFIX: &str = "__attach_version1.0_#";
const NAMEID_STORAGE: &str = "__nameid_version1.0";

/// MAPI property ids read from the message storage.
mod tag {
    pub const SUBJECT: u16 = 0x0037;
    pub const SENDER_NAME: u16 = 0x0C1A;
    pub const SENDER_EMAIL: u16 = 0x0C1F;
    pub const SENDER_SMTP_ADDRESS: u16 = 0x5D01;
    pub const RECEIVED_BY_SMTP_ADDRESS: u16 = 0x5D07;
    pub const DISPLAY_TO: u16 = 0x0E04;
    pub const DISPLAY_CC: u16 = 0x0E03;
    pub const DISPLAY_BCC: u16 = 0x0E02;
    pub const REPLY_RECIPIENT_NAMES: u16 = 0x0050;
    pub const BODY: u16 = 0x1000;
    pub const HTML: u16 = 0x1013;
    pub const RTF_COMPRESSED: u16 = 0x1009;
    pub const TRANSPORT_HEADERS: u16 = 0x007D;
    pub const INTERNET_MESSAGE_ID: u16 = 0x1035;
    pub const CONVERSATION_TOPIC: u16 = 0x0070;
    pub const CONVERSATION_INDEX: u16 = 0x0071;
    pub const MESSAGE_CLASS: u16 = 0x001A;
    pub const SENSITIVITY: u16 = 0x0036;
    pub const FLAG_STATUS: u16 = 0x1090;
    pub const READ_RECEIPT_REQUESTED: u16 = 0x0029;
    pub const DELIVERY_REPORT_REQUESTED: u16 = 0x0023;
    pub const CLIENT_SUBMIT_TIME: u16 = 0x0039;
    pub const DELIVERY_TIME: u16 = 0x0E06;

    pub const DISPLAY_NAME: u16 = 0x3001;
    pub const EMAIL_ADDRESS: u16 = 0x3003;
    pub const SMTP_ADDRESS: u16 = 0x39FE;
    pub const RECIPIENT_TYPE: u16 = 0x0C15;

    pub const ATTACH_DATA: u16 = 0x3701;
    pub const ATTACH_FILENAME: u16 = 0x3704;
    pub const ATTACH_LONG_FILENAME: u16 = 0x3707;
    pub const ATTACH_LONG_PATHNAME: u16 = 0x370D;
    pub const ATTACH_MIME_TAG: u16 = 0x370E;
}

/// `PSETID_Common` {00062008-0000-0000-C000-000000000046} in on-disk byte order.
const PSETID_COMMON: [u8; 16] = [
    0x08, 0x20, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46,
];
/// `PidLidCompanies`.
const LID_COMPANIES: u32 = 0x8539;
/// `PidNameKeywords` (categories) in `PS_PUBLIC_STRINGS`.
const NAME_KEYWORDS: &str = "Keywords";

/// Read an MSG file from disk.
pub fn read_msg_file(path: &Path) -> Result<SourceMessage> {
    if !path.exists() {
        return Err(ConvertError::FileNotFound(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|e| ConvertError::io(path, e))?;
    read_msg(BufReader::new(file), path)
}

/// Read an MSG message from any seekable source. `origin` is used in errors.
pub fn read_msg<F: Read + Seek>(inner: F, origin: &Path) -> Result<SourceMessage> {
    let mut cf = cfb::CompoundFile::open(inner).map_err(|e| ConvertError::NotCompoundFile {
        path: origin.to_path_buf(),
        reason: e.to_string(),
    })?;

    let root = PropertyStorage::load(&mut cf, Path::new("/"), StorageKind::Message).map_err(
        |e| match e {
            ConvertError::MissingPropertyStream(_) => {
                ConvertError::MissingPropertyStream(origin.to_path_buf())
            }
            other => other,
        },
    )?;

    let named = NamedProperties::load(&mut cf);

    let rtf_body = root
        .bytes(&mut cf, tag::RTF_COMPRESSED)
        .and_then(|raw| match decompress_rtf(&raw) {
            Ok(rtf) => Some(FieldValue::Bytes(rtf)),
            Err(e) => {
                debug!(error = %e, "Ignoring undecodable RTF body");
                None
            }
        });

    let mut message = SourceMessage {
        subject: root.value(&mut cf, tag::SUBJECT),
        sender_name: root.value(&mut cf, tag::SENDER_NAME),
        sender_email: root.value(&mut cf, tag::SENDER_EMAIL),
        sender_smtp_address: root.value(&mut cf, tag::SENDER_SMTP_ADDRESS),
        received_by_smtp_address: root.value(&mut cf, tag::RECEIVED_BY_SMTP_ADDRESS),
        display_to: root.value(&mut cf, tag::DISPLAY_TO),
        display_cc: root.value(&mut cf, tag::DISPLAY_CC),
        display_bcc: root.value(&mut cf, tag::DISPLAY_BCC),
        reply_to: root.value(&mut cf, tag::REPLY_RECIPIENT_NAMES),
        body: root.value(&mut cf, tag::BODY),
        html_body: root.value(&mut cf, tag::HTML),
        rtf_body,
        transport_headers: root.value(&mut cf, tag::TRANSPORT_HEADERS),
        message_id: root.value(&mut cf, tag::INTERNET_MESSAGE_ID),
        conversation_topic: root.value(&mut cf, tag::CONVERSATION_TOPIC),
        conversation_index: root.value(&mut cf, tag::CONVERSATION_INDEX),
        message_class: root.value(&mut cf, tag::MESSAGE_CLASS),
        sensitivity: root.fixed_value(tag::SENSITIVITY),
        flag_status: root.fixed_value(tag::FLAG_STATUS),
        read_receipt_requested: root.fixed_value(tag::READ_RECEIPT_REQUESTED),
        delivery_receipt_requested: root.fixed_value(tag::DELIVERY_REPORT_REQUESTED),
        client_submit_time: root.fixed_value(tag::CLIENT_SUBMIT_TIME),
        delivery_time: root.fixed_value(tag::DELIVERY_TIME),
        ..Default::default()
    };

    if let Some(id) = named.lookup_name(NAME_KEYWORDS) {
        message.categories = multi_value_text(&root, &mut cf, id);
    }
    if let Some(id) = named.lookup_lid(&PSETID_COMMON, LID_COMPANIES) {
        message.companies = multi_value_text(&root, &mut cf, id);
    }

    let (recipient_paths, attachment_paths) = child_storages(&cf);

    for path in recipient_paths {
        match read_recipient(&mut cf, &path) {
            Ok(recipient) => message.recipients.push(recipient),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable recipient"),
        }
    }

    for path in attachment_paths {
        let attachment = read_attachment(&mut cf, &path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Unreadable attachment storage");
            SourceAttachment {
                payload: Payload::Failed(e.to_string()),
                ..SourceAttachment::empty()
            }
        });
        message.attachments.push(attachment);
    }

    debug!(
        origin = %origin.display(),
        recipients = message.recipients.len(),
        attachments = message.attachments.len(),
        "Read MSG container"
    );
    Ok(message)
}

/// Recipient and attachment storages at the root, each sorted by index.
fn child_storages<F>(cf: &cfb::CompoundFile<F>) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut recipients = Vec::new();
    let mut attachments = Vec::new();
    for entry in cf.read_root_storage() {
        if !entry.is_storage() {
            continue;
        }
        let name = entry.name();
        if name.starts_with(RECIP_PREFIX) {
            recipients.push(entry.path().to_path_buf());
        } else if name.starts_with(ATTACH_PREFIX) {
            attachments.push(entry.path().to_path_buf());
        }
    }
    recipients.sort();
    attachments.sort();
    (recipients, attachments)
}

fn read_recipient<F: Read + Seek>(
    cf: &mut cfb::CompoundFile<F>,
    path: &Path,
) -> Result<SourceRecipient> {
    let props = PropertyStorage::load(cf, path, StorageKind::Child)?;
    let address = props
        .value(cf, tag::SMTP_ADDRESS)
        .or_else(|| props.value(cf, tag::EMAIL_ADDRESS));
    Ok(SourceRecipient {
        kind: RecipientKind::from_mapi(props.long(tag::RECIPIENT_TYPE).map_or(1, i64::from)),
        display_name: props.value(cf, tag::DISPLAY_NAME),
        address,
    })
}

fn read_attachment<F: Read + Seek>(
    cf: &mut cfb::CompoundFile<F>,
    path: &Path,
) -> Result<SourceAttachment> {
    let props = PropertyStorage::load(cf, path, StorageKind::Child)?;

    let payload = if props.has_stream(tag::ATTACH_DATA) {
        match props.bytes(cf, tag::ATTACH_DATA) {
            Some(data) => Payload::Data(data),
            None => Payload::Failed("attachment data stream could not be read".to_string()),
        }
    } else {
        // Embedded messages and OLE objects keep their data in a sub-storage
        debug!(path = %path.display(), "Attachment has no data stream");
        Payload::Absent
    };

    Ok(SourceAttachment {
        long_filename: props.value(cf, tag::ATTACH_LONG_FILENAME),
        short_filename: props.value(cf, tag::ATTACH_FILENAME),
        alternate_filename: props.value(cf, tag::ATTACH_LONG_PATHNAME).map(basename),
        display_name: props.value(cf, tag::DISPLAY_NAME),
        mime_tag: props.value(cf, tag::ATTACH_MIME_TAG),
        payload,
    })
}

fn multi_value_text<F: Read + Seek>(
    props: &PropertyStorage,
    cf: &mut cfb::CompoundFile<F>,
    id: u16,
) -> Option<FieldValue> {
    let values = props.multi_values(cf, id);
    if values.is_empty() {
        // Some writers store a single string instead
        return props.value(cf, id);
    }
    Some(FieldValue::Text(values.join(", ")))
}

/// Last path component of a Windows or POSIX path value.
fn basename(value: FieldValue) -> FieldValue {
    match value {
        FieldValue::Text(s) => {
            FieldValue::Text(s.rsplit(['\\', '/']).next().unwrap_or_default().to_string())
        }
        FieldValue::Bytes(b) => FieldValue::Bytes(
            b.rsplit(|&c| c == b'\\' || c == b'/')
                .next()
                .unwrap_or_default()
                .to_vec(),
        ),
        other => other,
    }
}

/// Property set a named property belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PropertySet {
    Mapi,
    PublicStrings,
    Guid([u8; 16]),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PropertyName {
    Lid(u32),
    Name(String),
}

/// The `__nameid_version1.0` mapping from (set, name) to a property id ≥ 0x8000.
#[derive(Debug, Default)]
struct NamedProperties {
    ids: HashMap<(PropertySet, PropertyName), u16>,
}

impl NamedProperties {
    fn load<F: Read + Seek>(cf: &mut cfb::CompoundFile<F>) -> Self {
        let base = Path::new("/").join(NAMEID_STORAGE);
        if !cf.is_storage(&base) {
            return Self::default();
        }
        let read = |cf: &mut cfb::CompoundFile<F>, id: u16| {
            read_stream(cf, &base.join(format!("__substg1.0_{id:04X}{PT_BINARY:04X}")))
                .unwrap_or_default()
        };
        let guids = read(cf, 0x0002);
        let entries = read(cf, 0x0003);
        let strings = read(cf, 0x0004);
        Self::parse(&guids, &entries, &strings)
    }

    fn parse(guids: &[u8], entries: &[u8], strings: &[u8]) -> Self {
        let mut ids = HashMap::new();
        for entry in entries.chunks_exact(8) {
            let name_or_offset = u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]);
            let index_and_kind = u16::from_le_bytes([entry[4], entry[5]]);
            let prop_index = u16::from_le_bytes([entry[6], entry[7]]);

            let set = match index_and_kind >> 1 {
                1 => PropertySet::Mapi,
                2 => PropertySet::PublicStrings,
                n => {
                    let Some(start) = usize::from(n).checked_sub(3).map(|i| i * 16) else {
                        continue;
                    };
                    match guids.get(start..start + 16).and_then(|g| g.try_into().ok()) {
                        Some(guid) => PropertySet::Guid(guid),
                        None => continue,
                    }
                }
            };
            let name = if index_and_kind & 1 == 1 {
                match string_at(strings, name_or_offset as usize) {
                    Some(s) => PropertyName::Name(s),
                    None => continue,
                }
            } else {
                PropertyName::Lid(name_or_offset)
            };
            ids.insert((set, name), 0x8000u16.wrapping_add(prop_index));
        }
        Self { ids }
    }

    fn lookup_name(&self, name: &str) -> Option<u16> {
        self.ids
            .get(&(PropertySet::PublicStrings, PropertyName::Name(name.to_string())))
            .copied()
    }

    fn lookup_lid(&self, guid: &[u8; 16], lid: u32) -> Option<u16> {
        self.ids
            .get(&(PropertySet::Guid(*guid), PropertyName::Lid(lid)))
            .copied()
    }
}

/// Length-prefixed UTF-16LE string in the named-property string stream.
fn string_at(strings: &[u8], offset: usize) -> Option<String> {
    let len_bytes = strings.get(offset..offset + 4)?;
    let len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
    let raw = strings.get(offset + 4..offset + 4 + len)?;
    Some(decode_utf16(raw))
}
