//! State materialization: fold a vault record back into tracked state.
//!
//! Every field the record carries is copied; fields the record lacks are
//! absent in the new state. The only exceptions are fields the vault never
//! returns at all, or returns only sometimes, which would otherwise be lost
//! on every refresh; those are carried over from the previous state when
//! the record lacks them.

use std::collections::BTreeMap;

use pcloud_client::{
    CredentialRecord, EntityId, Kind, SafeMemberRecord, SafeRecord, VaultRecord,
};

use crate::field::{Field, Scalar, schema};
use crate::state::{LastUpdated, TrackedState};

/// Fields the vault does not reliably report back for `kind`.
pub fn irrecoverable(kind: Kind) -> &'static [Field] {
    match kind {
        Kind::AwsCredential | Kind::DbCredential | Kind::MsCredential => &[Field::Secret],
        Kind::SafeObject => &[
            Field::Member,
            Field::MemberType,
            Field::PermissionLevel,
            Field::RetentionVersions,
        ],
        Kind::SafeMember => &[],
    }
}

/// Build the tracked state for `kind` from the vault's `record`.
///
/// The identifier is the one the vault reports, falling back to the one
/// in `previous`. The timestamp is the vault's modification time when it
/// reports one and the current time otherwise.
pub fn materialize(record: &VaultRecord, kind: Kind, previous: &TrackedState) -> TrackedState {
    let (mut fields, id, vault_epoch) = match record {
        VaultRecord::Credential(r) => credential(r, kind, &previous.id),
        VaultRecord::Safe(r) => safe(r, &previous.id),
        VaultRecord::SafeMember(r) => safe_member(r, &previous.id),
    };

    for field in irrecoverable(kind) {
        if let Some(v) = previous.fields.get(field) {
            fields.entry(*field).or_insert_with(|| v.clone());
        }
    }
    let table = schema(kind);
    fields.retain(|f, _| table.accepts(*f));

    let last_updated = vault_epoch
        .and_then(LastUpdated::from_vault_epoch)
        .unwrap_or_else(LastUpdated::local_now);

    TrackedState {
        kind,
        id,
        last_updated,
        fields,
    }
}

type Folded = (BTreeMap<Field, Scalar>, EntityId, Option<i64>);

fn put_str(fields: &mut BTreeMap<Field, Scalar>, field: Field, value: Option<&String>) {
    if let Some(v) = value {
        fields.insert(field, Scalar::String(v.clone()));
    }
}

fn credential(r: &CredentialRecord, kind: Kind, previous: &EntityId) -> Folded {
    let mut fields = BTreeMap::new();
    put_str(&mut fields, Field::Name, r.name.as_ref());
    put_str(&mut fields, Field::Address, r.address.as_ref());
    put_str(&mut fields, Field::Username, r.user_name.as_ref());
    put_str(&mut fields, Field::Platform, r.platform_id.as_ref());
    put_str(&mut fields, Field::Safe, r.safe_name.as_ref());
    put_str(&mut fields, Field::Secrettype, r.secret_type.as_ref());

    if let Some(sm) = &r.secret_management {
        if let Some(enabled) = sm.automatic_management_enabled {
            fields.insert(Field::SmManage, Scalar::Bool(enabled));
        }
        put_str(
            &mut fields,
            Field::SmManageReason,
            sm.manual_management_reason.as_ref(),
        );
    }

    let properties: &[(Field, &str)] = match kind {
        Kind::AwsCredential => &[
            (Field::AwsKid, "AWSAccessKeyID"),
            (Field::AwsAccountid, "AWSAccountID"),
            (Field::AwsAlias, "Alias"),
            (Field::AwsAccountregion, "Region"),
        ],
        Kind::DbCredential => &[
            (Field::DbPort, "Port"),
            (Field::Dbname, "Database"),
            (Field::DbDsn, "DSN"),
        ],
        Kind::MsCredential => &[
            (Field::MsAppid, "ApplicationID"),
            (Field::MsAppobjid, "ApplicationObjectID"),
            (Field::MsKeyid, "KeyID"),
            (Field::MsAdid, "ActiveDirectoryID"),
            (Field::MsDuration, "Duration"),
            (Field::MsPop, "PopulateIfNotExist"),
            (Field::MsKeydesc, "KeyDescription"),
        ],
        Kind::SafeObject | Kind::SafeMember => &[],
    };
    for (field, key) in properties {
        if let Some(v) = r.property(key) {
            fields.insert(*field, Scalar::String(v));
        }
    }

    let id = match r.id.as_deref() {
        Some(id) if !id.trim().is_empty() => EntityId::credential(id),
        _ => previous.clone(),
    };
    (fields, id, r.last_modified_time())
}

fn safe(r: &SafeRecord, previous: &EntityId) -> Folded {
    let mut fields = BTreeMap::new();
    put_str(&mut fields, Field::SafeName, r.safe_name.as_ref());
    put_str(&mut fields, Field::SafeDesc, r.description.as_ref());
    put_str(&mut fields, Field::SafeLoc, r.location.as_ref());
    put_str(&mut fields, Field::CpmName, r.managing_cpm.as_ref());
    if let Some(days) = r.number_of_days_retention {
        fields.insert(Field::Retention, Scalar::Int(days));
    }
    if let Some(versions) = r.number_of_versions_retention {
        fields.insert(Field::RetentionVersions, Scalar::Int(versions));
    }
    if let Some(purge) = r.auto_purge_enabled {
        fields.insert(Field::Purge, Scalar::Bool(purge));
    }

    let (prev_url, prev_number) = match previous {
        EntityId::Safe { url_id, number } => (url_id.as_str(), *number),
        _ => ("", 0),
    };
    let id = EntityId::Safe {
        url_id: r
            .safe_url_id
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(prev_url)
            .to_owned(),
        number: r.safe_number.unwrap_or(prev_number),
    };
    (fields, id, None)
}

fn safe_member(r: &SafeMemberRecord, previous: &EntityId) -> Folded {
    let mut fields = BTreeMap::new();
    put_str(&mut fields, Field::SafeName, r.safe_name.as_ref());
    put_str(&mut fields, Field::Member, r.member_name.as_ref());
    put_str(&mut fields, Field::MemberType, r.member_type.as_ref());
    if let Some(level) = r.permission_level() {
        fields.insert(Field::PermissionLevel, Scalar::from(level.as_str()));
    }

    let (prev_safe, prev_member) = match previous {
        EntityId::SafeMember {
            safe_url_id,
            member,
        } => (safe_url_id.as_str(), member.as_str()),
        _ => ("", ""),
    };
    let id = EntityId::SafeMember {
        safe_url_id: r
            .safe_url_id
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(prev_safe)
            .to_owned(),
        member: r
            .member_name
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(prev_member)
            .to_owned(),
    };
    (fields, id, None)
}
