//! Role & membership manager
//!
//! A role is either unregistered or active. Every active role names an admin
//! role whose members may grant, revoke and delete it, or hand the admin
//! pointer on. A role may administer itself; such roles are governed by
//! their own members.
//!
//! Mutations stage into a caller-supplied transaction and are driven by the
//! [`Registry`](crate::Registry), which commits them and invalidates cached
//! decisions for the affected accounts.

use std::sync::Arc;

use sof_repository::RoleRepository;
use sof_storage::{StorageBackend, Transaction};
use sof_types::{Account, Membership, RoleId, RoleRecord};
use tracing::{debug, instrument};

use crate::error::{RecordKind, RegistryError, Result};

#[derive(Clone)]
pub struct RoleManager {
    storage: Arc<dyn StorageBackend>,
    repo: RoleRepository,
}

impl RoleManager {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            repo: RoleRepository::new(),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn role_exists(&self, role: &RoleId) -> Result<bool> {
        Ok(self.repo.active(self.storage.as_ref(), role).await?.is_some())
    }

    /// The admin role of an active role
    pub async fn role_admin(&self, role: &RoleId) -> Result<Option<RoleId>> {
        Ok(self
            .repo
            .active(self.storage.as_ref(), role)
            .await?
            .map(|record| record.admin))
    }

    #[instrument(skip(self), level = "trace")]
    pub async fn has_role(&self, role: &RoleId, account: &Account) -> Result<bool> {
        Ok(self
            .repo
            .membership(self.storage.as_ref(), role, account)
            .await?
            .is_member)
    }

    pub async fn membership(&self, role: &RoleId, account: &Account) -> Result<Membership> {
        Ok(self
            .repo
            .membership(self.storage.as_ref(), role, account)
            .await?)
    }

    /// Members in stored order
    pub async fn members(&self, role: &RoleId) -> Result<Vec<Account>> {
        Ok(self
            .repo
            .members()
            .elements_of(self.storage.as_ref(), role)
            .await?)
    }

    /// Every role the account holds
    pub async fn roles_of(&self, account: &Account) -> Result<Vec<RoleId>> {
        Ok(self
            .repo
            .members()
            .owners_of(self.storage.as_ref(), account)
            .await?)
    }

    // =========================================================================
    // Transactional operations
    // =========================================================================

    pub(crate) async fn active_in(&self, txn: &dyn Transaction, role: &RoleId) -> Result<RoleRecord> {
        self.repo
            .active(txn, role)
            .await?
            .ok_or(RegistryError::RoleNotFound(*role))
    }

    pub(crate) async fn exists_in(&self, txn: &dyn Transaction, role: &RoleId) -> Result<bool> {
        Ok(self.repo.active(txn, role).await?.is_some())
    }

    /// Fails unless `account` is a member of `role`
    pub(crate) async fn require_member_in(&self, txn: &dyn Transaction, role: &RoleId, account: &Account) -> Result<()> {
        if !self.repo.members().contains(txn, role, account).await? {
            return Err(RegistryError::Unauthorized {
                account: *account,
                required: *role,
            });
        }
        Ok(())
    }

    /// Fails unless `caller` holds the admin role of `role`
    async fn require_admin_in(
        &self,
        txn: &dyn Transaction,
        role: &RoleId,
        caller: &Account,
    ) -> Result<RoleRecord> {
        let record = self.active_in(txn, role).await?;
        self.require_member_in(txn, &record.admin, caller).await?;
        Ok(record)
    }

    pub(crate) async fn create_in(&self, txn: &mut dyn Transaction, role: &RoleId, admin: &RoleId) -> Result<()> {
        if self.exists_in(&*txn, role).await? {
            return Err(RegistryError::already_exists(RecordKind::Role, role));
        }
        self.repo.records().put(
            txn,
            role,
            &RoleRecord {
                exists: true,
                admin: *admin,
            },
        )?;
        debug!(%role, %admin, "Role created");
        Ok(())
    }

    /// Create `role` on behalf of `caller`. A self-administered role gets
    /// `caller` as its first member; any other admin must be held by `caller`.
    pub(crate) async fn create_by_in(
        &self,
        txn: &mut dyn Transaction,
        caller: &Account,
        role: &RoleId,
        admin: &RoleId,
    ) -> Result<()> {
        if role == admin {
            return self.bootstrap_in(txn, role, caller).await;
        }
        self.require_member_in(&*txn, admin, caller).await?;
        self.create_in(txn, role, admin).await
    }

    /// Create a self-administered role whose first member is `owner`
    pub(crate) async fn bootstrap_in(&self, txn: &mut dyn Transaction, role: &RoleId, owner: &Account) -> Result<()> {
        self.create_in(txn, role, role).await?;
        self.repo.members().add(txn, role, owner, None).await?;
        Ok(())
    }

    /// Returns whether the membership was new
    pub(crate) async fn grant_in(
        &self,
        txn: &mut dyn Transaction,
        caller: &Account,
        role: &RoleId,
        account: &Account,
    ) -> Result<bool> {
        self.require_admin_in(&*txn, role, caller).await?;
        let granted = self.repo.members().add(txn, role, account, None).await?;
        debug!(%role, %account, granted, "Role granted");
        Ok(granted)
    }

    /// Returns whether a membership was removed
    pub(crate) async fn revoke_in(
        &self,
        txn: &mut dyn Transaction,
        caller: &Account,
        role: &RoleId,
        account: &Account,
    ) -> Result<bool> {
        self.require_admin_in(&*txn, role, caller).await?;
        let revoked = self.repo.members().remove(txn, role, account).await?;
        debug!(%role, %account, revoked, "Role revoked");
        Ok(revoked)
    }

    /// An account dropping its own membership; needs no admin rights
    pub(crate) async fn renounce_in(&self, txn: &mut dyn Transaction, role: &RoleId, account: &Account) -> Result<bool> {
        self.active_in(&*txn, role).await?;
        let renounced = self.repo.members().remove(txn, role, account).await?;
        debug!(%role, %account, renounced, "Role renounced");
        Ok(renounced)
    }

    /// Point `role` at a new admin role, which need not exist yet.
    /// Returns the previous admin.
    pub(crate) async fn transfer_admin_in(
        &self,
        txn: &mut dyn Transaction,
        caller: &Account,
        role: &RoleId,
        new_admin: &RoleId,
    ) -> Result<RoleId> {
        let mut record = self.require_admin_in(&*txn, role, caller).await?;
        let previous = record.admin;
        record.admin = *new_admin;
        self.repo.records().put(txn, role, &record)?;
        debug!(%role, %previous, %new_admin, "Role admin transferred");
        Ok(previous)
    }

    /// Remove every membership and deactivate the role; returns the former members
    pub(crate) async fn delete_in(&self, txn: &mut dyn Transaction, caller: &Account, role: &RoleId) -> Result<Vec<Account>> {
        self.require_admin_in(&*txn, role, caller).await?;
        let members = self.repo.members().clear_owner(txn, role).await?;
        self.repo.records().put(txn, role, &RoleRecord::default())?;
        debug!(%role, removed = members.len(), "Role deleted");
        Ok(members)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use sof_storage::MemoryBackend;

    use super::*;

    fn manager() -> RoleManager {
        RoleManager::new(Arc::new(MemoryBackend::new()))
    }

    async fn create(manager: &RoleManager, role: RoleId, admin: RoleId) {
        let mut txn = manager.storage.transaction().await.unwrap();
        manager.create_in(txn.as_mut(), &role, &admin).await.unwrap();
        txn.commit().await.unwrap();
    }

    async fn bootstrap(manager: &RoleManager, role: RoleId, owner: Account) {
        let mut txn = manager.storage.transaction().await.unwrap();
        manager.bootstrap_in(txn.as_mut(), &role, &owner).await.unwrap();
        txn.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let manager = manager();
        let role = RoleId::from_name("r");
        create(&manager, role, role).await;

        let mut txn = manager.storage.transaction().await.unwrap();
        let err = manager.create_in(txn.as_mut(), &role, &role).await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::AlreadyExists {
                kind: RecordKind::Role,
                ..
            }
        ));
        assert_eq!(manager.role_admin(&role).await.unwrap(), Some(role));
    }

    #[tokio::test]
    async fn test_grant_requires_admin_membership() {
        let manager = manager();
        let admin = RoleId::from_name("admin");
        let role = RoleId::from_name("member");
        let owner = Account::from(1);
        let stranger = Account::from(2);
        bootstrap(&manager, admin, owner).await;
        create(&manager, role, admin).await;

        let mut txn = manager.storage.transaction().await.unwrap();
        let err = manager
            .grant_in(txn.as_mut(), &stranger, &role, &stranger)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Unauthorized { required, .. } if required == admin));

        assert!(manager
            .grant_in(txn.as_mut(), &owner, &role, &stranger)
            .await
            .unwrap());
        txn.commit().await.unwrap();

        assert!(manager.has_role(&role, &stranger).await.unwrap());
        assert!(!manager.has_role(&admin, &stranger).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_by_caller() {
        let manager = manager();
        let caller = Account::from(7);
        let own = RoleId::from_name("own");
        let child = RoleId::from_name("child");
        let foreign = RoleId::from_name("foreign");

        let mut txn = manager.storage.transaction().await.unwrap();
        manager.create_by_in(txn.as_mut(), &caller, &own, &own).await.unwrap();
        manager.create_by_in(txn.as_mut(), &caller, &child, &own).await.unwrap();
        let err = manager
            .create_by_in(txn.as_mut(), &caller, &foreign, &RoleId::from_name("nobody"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Unauthorized { .. }));
        txn.commit().await.unwrap();

        assert_eq!(manager.members(&own).await.unwrap(), vec![caller]);
        assert!(manager.members(&child).await.unwrap().is_empty());
        assert!(!manager.role_exists(&foreign).await.unwrap());
    }

    #[tokio::test]
    async fn test_grant_on_missing_role() {
        let manager = manager();
        let mut txn = manager.storage.transaction().await.unwrap();
        let err = manager
            .grant_in(txn.as_mut(), &Account::from(1), &RoleId::from_name("x"), &Account::from(2))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::RoleNotFound(_)));
    }

    #[tokio::test]
    async fn test_removing_last_member_keeps_role() {
        let manager = manager();
        let role = RoleId::from_name("open");
        let owner = Account::from(1);
        bootstrap(&manager, role, owner).await;

        let mut txn = manager.storage.transaction().await.unwrap();
        assert!(manager.renounce_in(txn.as_mut(), &role, &owner).await.unwrap());
        txn.commit().await.unwrap();

        assert!(manager.role_exists(&role).await.unwrap());
        assert!(manager.members(&role).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_admin_to_undeclared_role() {
        let manager = manager();
        let role = RoleId::from_name("r");
        let owner = Account::from(1);
        let future_admin = RoleId::from_name("later");
        bootstrap(&manager, role, owner).await;

        let mut txn = manager.storage.transaction().await.unwrap();
        let previous = manager
            .transfer_admin_in(txn.as_mut(), &owner, &role, &future_admin)
            .await
            .unwrap();
        assert_eq!(previous, role);
        txn.commit().await.unwrap();

        assert_eq!(manager.role_admin(&role).await.unwrap(), Some(future_admin));

        // The old admin members lost their rights
        let mut txn = manager.storage.transaction().await.unwrap();
        let err = manager
            .grant_in(txn.as_mut(), &owner, &role, &Account::from(3))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_delete_clears_members_and_allows_recreate() {
        let manager = manager();
        let role = RoleId::from_name("r");
        let owner = Account::from(1);
        bootstrap(&manager, role, owner).await;

        let mut txn = manager.storage.transaction().await.unwrap();
        manager
            .grant_in(txn.as_mut(), &owner, &role, &Account::from(2))
            .await
            .unwrap();
        let removed = manager.delete_in(txn.as_mut(), &owner, &role).await.unwrap();
        txn.commit().await.unwrap();

        assert_eq!(removed, vec![owner, Account::from(2)]);
        assert!(!manager.role_exists(&role).await.unwrap());
        assert!(manager.roles_of(&owner).await.unwrap().is_empty());

        create(&manager, role, role).await;
        assert!(manager.role_exists(&role).await.unwrap());
        assert!(manager.members(&role).await.unwrap().is_empty());
    }
}
