//! Payload mapping: resolved configuration to a kind-specific vault payload.
//!
//! All validation happens here, before any vault call, in a fixed order:
//! fields foreign to the kind, then missing required fields, then scalar
//! type mismatches, then permission levels.

use pcloud_client::{
    AccountProperties, AwsProperties, CredentialPayload, DbProperties, Kind, MemberGrant,
    MsProperties, PermissionLevel, SafeMemberPayload, SafePayload, SecretManagement, VaultPayload,
};

use crate::error::{Problem, ValidationError};
use crate::field::{Field, Scalar, schema};
use crate::resolver::ResolvedConfig;

/// Build the creation payload for `cfg`.
///
/// # Errors
///
/// Returns a [`ValidationError`] naming the first offending field.
pub fn map(cfg: &ResolvedConfig) -> Result<VaultPayload, ValidationError> {
    validate(cfg)?;
    let r = Reader(cfg);

    let payload = match cfg.kind() {
        Kind::AwsCredential => credential(
            &r,
            None,
            AccountProperties::Aws(AwsProperties {
                access_key_id: r.required_str(Field::AwsKid)?,
                account_id: r.required_str(Field::AwsAccountid)?,
                alias: r.optional_str(Field::AwsAlias)?,
                region: r.optional_str(Field::AwsAccountregion)?,
            }),
        )?,
        Kind::DbCredential => credential(
            &r,
            Some(r.required_str(Field::Address)?),
            AccountProperties::Db(DbProperties {
                port: r.optional_str(Field::DbPort)?,
                database: r.optional_str(Field::Dbname)?,
                dsn: r.optional_str(Field::DbDsn)?,
            }),
        )?,
        Kind::MsCredential => credential(
            &r,
            Some(r.required_str(Field::Address)?),
            AccountProperties::Ms(MsProperties {
                application_id: r.required_str(Field::MsAppid)?,
                application_object_id: r.required_str(Field::MsAppobjid)?,
                key_id: r.required_str(Field::MsKeyid)?,
                active_directory_id: r.optional_str(Field::MsAdid)?,
                duration: r.optional_str(Field::MsDuration)?,
                populate_if_not_exist: r.optional_str(Field::MsPop)?,
                key_description: r.optional_str(Field::MsKeydesc)?,
            }),
        )?,
        Kind::SafeObject => VaultPayload::Safe(SafePayload {
            safe_name: r.required_str(Field::SafeName)?,
            description: r.optional_str(Field::SafeDesc)?,
            location: r.optional_str(Field::SafeLoc)?,
            managing_cpm: r.optional_str(Field::CpmName)?,
            number_of_days_retention: r.optional_int(Field::Retention)?,
            number_of_versions_retention: r.optional_int(Field::RetentionVersions)?,
            auto_purge_enabled: r.optional_bool(Field::Purge)?,
            owner: grant(&r)?,
        }),
        Kind::SafeMember => VaultPayload::SafeMember(SafeMemberPayload {
            safe_name: r.required_str(Field::SafeName)?,
            grant: grant(&r)?,
        }),
    };
    Ok(payload)
}

fn credential(
    r: &Reader<'_>,
    address: Option<String>,
    properties: AccountProperties,
) -> Result<VaultPayload, ValidationError> {
    Ok(VaultPayload::Credential(CredentialPayload {
        name: r.required_str(Field::Name)?,
        address,
        user_name: r.required_str(Field::Username)?,
        platform_id: r.required_str(Field::Platform)?,
        safe_name: r.required_str(Field::Safe)?,
        secret_type: r.required_str(Field::Secrettype)?,
        secret: r.required_str(Field::Secret)?,
        platform_account_properties: properties,
        secret_management: SecretManagement {
            automatic_management_enabled: r.optional_bool(Field::SmManage)?,
            manual_management_reason: r.optional_str(Field::SmManageReason)?,
        },
    }))
}

fn grant(r: &Reader<'_>) -> Result<MemberGrant, ValidationError> {
    Ok(MemberGrant {
        member_name: r.required_str(Field::Member)?,
        member_type: r.required_str(Field::MemberType)?,
        permission_level: permission_level(&r.required_str(Field::PermissionLevel)?)?,
    })
}

fn permission_level(value: &str) -> Result<PermissionLevel, ValidationError> {
    value.parse().map_err(|_| {
        ValidationError::new(
            Field::PermissionLevel,
            Problem::InvalidPermissionLevel {
                value: value.to_owned(),
            },
        )
    })
}

fn validate(cfg: &ResolvedConfig) -> Result<(), ValidationError> {
    let kind = cfg.kind();
    let table = schema(kind);

    if let Some(field) = cfg.unexpected().first() {
        return Err(ValidationError::new(
            *field,
            Problem::UnexpectedField { kind },
        ));
    }

    if let Some(field) = table.required.iter().find(|f| cfg.get(**f).is_absent()) {
        return Err(ValidationError::new(*field, Problem::Missing));
    }

    for (field, value) in cfg.present() {
        if value.ty() != field.ty() {
            return Err(ValidationError::new(
                field,
                Problem::WrongType {
                    expected: field.ty(),
                    found: value.ty(),
                },
            ));
        }
    }

    if let Some(Scalar::String(level)) = cfg.value(Field::PermissionLevel) {
        permission_level(level)?;
    }
    Ok(())
}

/// Typed access to resolved values. `validate` has already run, so the
/// error paths here are unreachable in practice but still reported.
struct Reader<'a>(&'a ResolvedConfig);

impl Reader<'_> {
    fn required_str(&self, field: Field) -> Result<String, ValidationError> {
        self.optional_str(field)?
            .ok_or_else(|| ValidationError::new(field, Problem::Missing))
    }

    fn optional_str(&self, field: Field) -> Result<Option<String>, ValidationError> {
        match self.0.value(field) {
            None => Ok(None),
            Some(Scalar::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(wrong_type(field, other)),
        }
    }

    fn optional_bool(&self, field: Field) -> Result<Option<bool>, ValidationError> {
        match self.0.value(field) {
            None => Ok(None),
            Some(Scalar::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(wrong_type(field, other)),
        }
    }

    fn optional_int(&self, field: Field) -> Result<Option<i64>, ValidationError> {
        match self.0.value(field) {
            None => Ok(None),
            Some(Scalar::Int(i)) => Ok(Some(*i)),
            Some(other) => Err(wrong_type(field, other)),
        }
    }
}

fn wrong_type(field: Field, found: &Scalar) -> ValidationError {
    ValidationError::new(
        field,
        Problem::WrongType {
            expected: field.ty(),
            found: found.ty(),
        },
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::desired::DesiredResource;
    use crate::resolver::resolve;

    fn sample(field: Field) -> Scalar {
        match field {
            Field::SmManage | Field::Purge => Scalar::Bool(true),
            Field::Retention | Field::RetentionVersions => Scalar::Int(7),
            Field::PermissionLevel => Scalar::from("read"),
            other => Scalar::from(format!("{other}-value")),
        }
    }

    fn full(kind: Kind) -> DesiredResource {
        let mut desired = DesiredResource::new(kind);
        for field in schema(kind).fields() {
            desired = desired.with(field, sample(field));
        }
        desired
    }

    fn map_desired(desired: &DesiredResource) -> Result<VaultPayload, ValidationError> {
        map(&resolve(desired, &HashMap::new()))
    }

    #[test]
    fn fully_declared_resources_map_to_their_kind() {
        for kind in Kind::ALL {
            let payload = map_desired(&full(kind)).unwrap();
            assert_eq!(payload.kind(), kind);
        }
    }

    #[test]
    fn each_missing_required_field_is_rejected() {
        for kind in Kind::ALL {
            for missing in schema(kind).required {
                let mut desired = full(kind);
                desired.fields.remove(missing);
                let err = map_desired(&desired).unwrap_err();
                assert_eq!(err, ValidationError::new(*missing, Problem::Missing), "{kind}");
            }
        }
    }

    #[test]
    fn any_subset_of_optional_fields_is_accepted() {
        for kind in Kind::ALL {
            let optional = schema(kind).optional;
            for mask in 0u32..(1 << optional.len()) {
                let mut desired = full(kind);
                for (i, field) in optional.iter().enumerate() {
                    if mask & (1 << i) == 0 {
                        desired.fields.remove(field);
                    }
                }
                assert!(map_desired(&desired).is_ok(), "{kind} mask {mask:b}");
            }
        }
    }

    #[test]
    fn absent_region_is_omitted_from_aws_payload() {
        let mut desired = full(Kind::AwsCredential);
        desired.fields.remove(&Field::AwsAccountregion);
        let VaultPayload::Credential(payload) = map_desired(&desired).unwrap() else {
            panic!("expected a credential payload");
        };
        let AccountProperties::Aws(props) = &payload.platform_account_properties else {
            panic!("expected AWS properties");
        };
        assert_eq!(props.region, None);
        assert_eq!(payload.address, None);
    }

    #[test]
    fn declared_empty_optional_is_kept_as_empty() {
        let desired = full(Kind::DbCredential).with(Field::Dbname, "");
        let VaultPayload::Credential(payload) = map_desired(&desired).unwrap() else {
            panic!("expected a credential payload");
        };
        let AccountProperties::Db(props) = &payload.platform_account_properties else {
            panic!("expected DB properties");
        };
        assert_eq!(props.database.as_deref(), Some(""));
    }

    #[test]
    fn unknown_permission_level_is_rejected() {
        for kind in [Kind::SafeObject, Kind::SafeMember] {
            let desired = full(kind).with(Field::PermissionLevel, "owner");
            let err = map_desired(&desired).unwrap_err();
            assert_eq!(err.field, Field::PermissionLevel);
            assert_eq!(
                err.problem,
                Problem::InvalidPermissionLevel {
                    value: "owner".to_owned()
                }
            );
        }
    }

    #[test]
    fn permission_level_from_environment_is_validated() {
        let mut desired = full(Kind::SafeMember);
        desired.fields.remove(&Field::PermissionLevel);
        let env: HashMap<String, String> = [(
            "CYBERARK_SAFE_PERMISSION_LEVEL".to_owned(),
            "Admin".to_owned(),
        )]
        .into();
        let err = map(&resolve(&desired, &env)).unwrap_err();
        assert_eq!(err.field, Field::PermissionLevel);
    }

    #[test]
    fn wrong_scalar_type_is_rejected() {
        let desired = full(Kind::SafeObject).with(Field::Retention, "seven");
        let err = map_desired(&desired).unwrap_err();
        assert_eq!(
            err,
            ValidationError::new(
                Field::Retention,
                Problem::WrongType {
                    expected: crate::field::FieldType::Int,
                    found: crate::field::FieldType::String,
                }
            )
        );
    }

    #[test]
    fn foreign_field_is_rejected_before_missing_ones() {
        let desired = DesiredResource::new(Kind::AwsCredential).with(Field::DbPort, "5432");
        let err = map_desired(&desired).unwrap_err();
        assert_eq!(
            err,
            ValidationError::new(
                Field::DbPort,
                Problem::UnexpectedField {
                    kind: Kind::AwsCredential
                }
            )
        );
    }

    #[test]
    fn missing_is_reported_before_wrong_type() {
        let mut desired = full(Kind::SafeObject).with(Field::Purge, "yes");
        desired.fields.remove(&Field::Member);
        let err = map_desired(&desired).unwrap_err();
        assert_eq!(err.problem, Problem::Missing);
    }

    #[test]
    fn safe_payload_carries_seed_member() {
        let VaultPayload::Safe(safe) = map_desired(&full(Kind::SafeObject)).unwrap() else {
            panic!("expected a safe payload");
        };
        assert_eq!(safe.owner.permission_level, PermissionLevel::Read);
        assert_eq!(safe.owner.member_name, "member-value");
        assert_eq!(safe.number_of_days_retention, Some(7));
        assert_eq!(safe.auto_purge_enabled, Some(true));
    }
}
