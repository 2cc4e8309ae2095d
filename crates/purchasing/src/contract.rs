use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use procura_core::{ContractId, DomainError, DomainResult, Entity, ItemId, SupplierId};

/// A supply agreement for one item with one supplier.
///
/// Several active contracts per item are allowed (multi-sourcing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyContract {
    id: ContractId,
    item_id: ItemId,
    supplier_id: SupplierId,
    unit_price: f64,
    active: bool,
    payment_terms_days: u32,
    valid_from: NaiveDate,
    valid_until: Option<NaiveDate>,
}

impl SupplyContract {
    pub fn new(
        id: ContractId,
        item_id: ItemId,
        supplier_id: SupplierId,
        unit_price: f64,
        payment_terms_days: u32,
        valid_from: NaiveDate,
        valid_until: Option<NaiveDate>,
    ) -> DomainResult<Self> {
        if !(unit_price.is_finite() && unit_price > 0.0) {
            return Err(DomainError::validation("contract price must be positive"));
        }
        if valid_until.is_some_and(|until| until < valid_from) {
            return Err(DomainError::validation("contract validity window ends before it starts"));
        }
        Ok(Self {
            id,
            item_id,
            supplier_id,
            unit_price,
            active: true,
            payment_terms_days,
            valid_from,
            valid_until,
        })
    }

    pub fn id_typed(&self) -> ContractId {
        self.id
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn supplier_id(&self) -> SupplierId {
        self.supplier_id
    }

    pub fn unit_price(&self) -> f64 {
        self.unit_price
    }

    pub fn payment_terms_days(&self) -> u32 {
        self.payment_terms_days
    }

    /// Active flag set and `on` inside the validity window.
    pub fn is_active_on(&self, on: NaiveDate) -> bool {
        self.active && self.valid_from <= on && self.valid_until.is_none_or(|until| on <= until)
    }

    pub fn offer(&self) -> ContractOffer {
        ContractOffer {
            contract_id: self.id,
            supplier_id: self.supplier_id,
            unit_price: self.unit_price,
            payment_terms_days: self.payment_terms_days,
        }
    }
}

impl Entity for SupplyContract {
    type Id = ContractId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// One sourcing option, as returned by a [`ContractRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContractOffer {
    pub contract_id: ContractId,
    pub supplier_id: SupplierId,
    pub unit_price: f64,
    pub payment_terms_days: u32,
}

/// Read access to supply contracts.
pub trait ContractRegistry {
    /// Contracts usable for `item_id` on `on`.
    fn active_contracts(&self, item_id: ItemId, on: NaiveDate) -> Vec<ContractOffer>;
}

/// In-memory contract registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractBook {
    contracts: Vec<SupplyContract>,
}

impl ContractBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, contract: SupplyContract) -> DomainResult<()> {
        if self.contracts.iter().any(|c| c.id == contract.id) {
            return Err(DomainError::invariant(format!("contract {} already registered", contract.id)));
        }
        self.contracts.push(contract);
        Ok(())
    }

    pub fn deactivate(&mut self, id: ContractId) -> DomainResult<()> {
        let contract = self
            .contracts
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| DomainError::not_found(format!("contract {id}")))?;
        contract.active = false;
        Ok(())
    }

    pub fn for_item(&self, item_id: ItemId) -> impl Iterator<Item = &SupplyContract> {
        self.contracts.iter().filter(move |c| c.item_id == item_id)
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

impl ContractRegistry for ContractBook {
    fn active_contracts(&self, item_id: ItemId, on: NaiveDate) -> Vec<ContractOffer> {
        self.for_item(item_id)
            .filter(|c| c.is_active_on(on))
            .map(SupplyContract::offer)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn contract(n: u128, price: f64, until: Option<NaiveDate>) -> SupplyContract {
        SupplyContract::new(
            ContractId::from_u128(n),
            ItemId::from_u128(1),
            SupplierId::from_u128(n),
            price,
            30,
            day(1),
            until,
        )
        .unwrap()
    }

    #[test]
    fn new_validates_price_and_window() {
        let c = SupplyContract::new(
            ContractId::from_u128(1),
            ItemId::from_u128(1),
            SupplierId::from_u128(1),
            0.0,
            30,
            day(1),
            None,
        );
        assert!(c.is_err());

        let c = SupplyContract::new(
            ContractId::from_u128(1),
            ItemId::from_u128(1),
            SupplierId::from_u128(1),
            2.0,
            30,
            day(10),
            Some(day(5)),
        );
        assert!(c.is_err());
    }

    #[test]
    fn active_contracts_respect_flag_and_window() {
        let mut book = ContractBook::new();
        book.add(contract(1, 10.0, None)).unwrap();
        book.add(contract(2, 8.0, Some(day(10)))).unwrap();
        book.add(contract(3, 7.0, None)).unwrap();
        book.deactivate(ContractId::from_u128(3)).unwrap();

        let on_5th = book.active_contracts(ItemId::from_u128(1), day(5));
        assert_eq!(on_5th.len(), 2);

        let on_20th = book.active_contracts(ItemId::from_u128(1), day(20));
        assert_eq!(on_20th.len(), 1);
        assert_eq!(on_20th[0].unit_price, 10.0);

        assert!(book.active_contracts(ItemId::from_u128(2), day(5)).is_empty());
    }

    #[test]
    fn duplicate_contract_ids_are_rejected() {
        let mut book = ContractBook::new();
        book.add(contract(1, 10.0, None)).unwrap();
        assert!(book.add(contract(1, 9.0, None)).is_err());
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn deactivate_unknown_contract_is_not_found() {
        let mut book = ContractBook::new();
        assert!(matches!(
            book.deactivate(ContractId::from_u128(9)),
            Err(DomainError::NotFound(_))
        ));
    }
}
