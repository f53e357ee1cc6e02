//! Role records and role membership.

use sof_storage::StorageRead;
use sof_types::{Account, Membership, RoleId, RoleRecord};

use crate::error::RepositoryResult;
use crate::keys;
use crate::relation::{Endpoint, IndexedRelation};
use crate::table::RecordTable;

static ROLES: RecordTable<RoleId, RoleRecord> = RecordTable::new(keys::ROLE_TABLE);

/// Role -> member accounts. Accounts have no records of their own.
static ROLE_MEMBERS: IndexedRelation<RoleId, Account> = IndexedRelation::new(
    "role_members",
    Endpoint::Record(keys::ROLE_TABLE),
    Endpoint::Unchecked,
);

/// Access to the role table and the role membership relation
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleRepository;

impl RoleRepository {
    pub const fn new() -> Self {
        Self
    }

    pub fn records(&self) -> &'static RecordTable<RoleId, RoleRecord> {
        &ROLES
    }

    pub fn members(&self) -> &'static IndexedRelation<RoleId, Account> {
        &ROLE_MEMBERS
    }

    /// The role's record if it is live
    pub async fn active<R>(&self, reader: &R, role: &RoleId) -> RepositoryResult<Option<RoleRecord>>
    where
        R: StorageRead + ?Sized,
    {
        Ok(ROLES.get(reader, role).await?.filter(|record| record.exists))
    }

    /// Whether `account` holds `role` and, if so, its position in the member array
    pub async fn membership<R>(&self, reader: &R, role: &RoleId, account: &Account) -> RepositoryResult<Membership>
    where
        R: StorageRead + ?Sized,
    {
        Ok(match ROLE_MEMBERS.link(reader, role, account).await? {
            Some(link) => Membership {
                is_member: true,
                index: link.forward_index,
            },
            None => Membership {
                is_member: false,
                index: 0,
            },
        })
    }
}
