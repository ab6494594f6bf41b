//! The three concrete, declarative parser specs for prices/stores/promos
//! publications (spec.md §4.3 step 4). Adding a new publication variant is
//! a matter of listing capturers here — no code changes elsewhere.
//!
//! Field/tag lists are carried over from the reference implementation's
//! `parsers.go` verbatim, since they encode hard-won knowledge of what
//! each publisher actually calls each field.
use crate::xml::capturer::{capturers, Capturer, ParserSpec};

pub fn prices_spec() -> ParserSpec {
    ParserSpec {
        divider: Capturer::new("", &["item", "product"]),
        global: capturers(&[
            ":chain_id", "ChainId",
            ":subchain_id", "SubchainId",
            ":store_id", "StoreId",
        ]),
        mandatory: capturers(&[
            ":update_time", "PriceUpdateDate",
            ":item_code", "ItemCode",
            ":item_name", "ItemName",
            ":price", "ItemPrice",
            ":item_type", "ItemType",
        ]),
        optional: capturers(&[
            ":manufacturer_name", "ManufacturerName",
            ":manufacturer_country", "ManufacturerCountry",
            ":manufacturer_item_description", "ManufacturerItemDescription",
            ":unit_quantity", "UnitQty",
            ":quantity", "Quantity",
            ":unit_of_measure", "UnitOfMeasure",
            ":is_weighted", "bIsWeighted", "blsWeighted",
            ":quantity_in_package", "QtyInPackage",
            ":unit_of_measure_price", "UnitOfMeasurePrice",
            ":allow_discount", "AllowDiscount",
            ":item_status", "ItemStatus",
        ]),
        repeated: Vec::new(),
    }
}

pub fn stores_spec() -> ParserSpec {
    ParserSpec {
        divider: Capturer::new("", &["store"]),
        global: capturers(&[":chain_id", "ChainId"]),
        mandatory: capturers(&[
            ":subchain_id", "SubchainId",
            ":store_id", "StoreId",
            ":bikoret_no", "BikoretNo",
            ":store_type", "StoreType",
            ":chain_name", "ChainName",
            ":subchain_name", "SubchainName",
            ":store_name", "StoreName",
        ]),
        optional: capturers(&[
            ":address", "Address",
            ":city", "City",
            ":zip_code", "ZipCode",
            ":last_update_time", "LastUpdateTime",
            ":last_update_date", "LastUpdateDate",
        ]),
        repeated: Vec::new(),
    }
}

pub fn promos_spec() -> ParserSpec {
    ParserSpec {
        divider: Capturer::new("", &["promotion", "sale"]),
        global: capturers(&[
            ":chain_id", "ChainId",
            ":subchain_id", "SubchainId",
            ":store_id", "StoreId",
        ]),
        mandatory: capturers(&[
            ":promotion_id", "PromotionId",
            ":promotion_description", "PromotionDescription",
        ]),
        optional: capturers(&[
            ":promotion_start_date", "PromotionStartDate",
            ":promotion_start_hour", "PromotionStartHour",
            ":promotion_end_date", "PromotionEndDate",
            ":promotion_end_hour", "PromotionEndHour",
            ":reward_type", "RewardType",
            ":allow_multiple_discounts", "AllowMultipleDiscounts",
            ":min_qty", "MinQty",
            ":max_qty", "MaxQty",
            ":discount_rate", "DiscountRate",
            ":discount_type", "DiscountType",
            ":min_purchase_amnt", "MinPurchaseAmnt",
            ":min_no_of_item_offered", "MinNoOfItemOfered",
            ":price_update_date", "PriceUpdateDate",
            ":discounted_price", "DiscountedPrice",
            ":discounted_price_per_mida", "DiscountedPricePerMida",
            ":additional_is_coupn", "AdditionalIsCoupon", "AdditionalsCoupon",
            ":additional_gift_count", "AdditionalGiftCount",
            ":additional_is_total", "AdditionalIsTotal",
            ":additional_min_basket_amount", "AdditionalMinBasketAmount",
            ":remarks", "Remarks",
        ]),
        repeated: capturers(&[
            ":item_code", "ItemCode", "ItemId",
            ":item_type", "ItemType",
            ":is_gift_item", "IsGiftItem",
        ]),
    }
}

/// Which publication type a file belongs to, inferred from its filename
/// prefix (spec.md §6 "Filename conventions").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicationType {
    Prices,
    Stores,
    Promos,
}

impl PublicationType {
    pub fn spec(self) -> ParserSpec {
        match self {
            PublicationType::Prices => prices_spec(),
            PublicationType::Stores => stores_spec(),
            PublicationType::Promos => promos_spec(),
        }
    }

    pub fn from_filename(name: &str) -> Option<Self> {
        if name.starts_with("Price") {
            Some(PublicationType::Prices)
        } else if name.starts_with("Store") {
            Some(PublicationType::Stores)
        } else if name.starts_with("Promo") {
            Some(PublicationType::Promos)
        } else {
            None
        }
    }
}
