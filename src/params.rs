//! Configuration parameter codec.
//!
//! FortiFlex stores the settings of a configuration as a flat list of
//! `{id, value}` pairs, where the id names both the product and the field.
//! Users write those settings as one block per product, for example:
//!
//! ```hcl
//! fgt_vm_bundle {
//!   cpu_size            = "4"
//!   service_pkg         = "UTM"
//!   fortiguard_services = ["IPS", "AVDB"]
//! }
//! ```
//!
//! [`encode`] turns such a block into parameter pairs and [`decode`] turns the
//! pairs returned by the API back into a block. Both directions are driven by
//! the static [`PARAMETERS`] table.

use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, Constraint};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::warn;

/// Value sent for a list parameter the user explicitly left empty.
pub const NONE_VALUE: &str = "NONE";

/// A FortiFlex product type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductType {
    FgtVmBundle,
    FmgVm,
    FwbVm,
    FgtVmLcs,
    FcEmsOp,
    FazVm,
    FpcVm,
    FadVm,
    FgtHw,
    FapHw,
    FswHw,
    FwbcPrivate,
    FwbcPublic,
    FcEmsCloud,
    FortiSase,
    FortiEdr,
    SiemCloud,
}

impl ProductType {
    /// Every product type, in product-id order.
    pub const ALL: [ProductType; 17] = [
        ProductType::FgtVmBundle,
        ProductType::FmgVm,
        ProductType::FwbVm,
        ProductType::FgtVmLcs,
        ProductType::FcEmsOp,
        ProductType::FazVm,
        ProductType::FpcVm,
        ProductType::FadVm,
        ProductType::FgtHw,
        ProductType::FapHw,
        ProductType::FswHw,
        ProductType::FwbcPrivate,
        ProductType::FwbcPublic,
        ProductType::FcEmsCloud,
        ProductType::FortiSase,
        ProductType::FortiEdr,
        ProductType::SiemCloud,
    ];

    /// The numeric product type id used on the wire.
    pub fn id(self) -> i64 {
        match self {
            ProductType::FgtVmBundle => 1,
            ProductType::FmgVm => 2,
            ProductType::FwbVm => 3,
            ProductType::FgtVmLcs => 4,
            ProductType::FcEmsOp => 5,
            ProductType::FazVm => 7,
            ProductType::FpcVm => 8,
            ProductType::FadVm => 9,
            ProductType::FgtHw => 101,
            ProductType::FapHw => 102,
            ProductType::FswHw => 103,
            ProductType::FwbcPrivate => 202,
            ProductType::FwbcPublic => 203,
            ProductType::FcEmsCloud => 204,
            ProductType::FortiSase => 205,
            ProductType::FortiEdr => 206,
            ProductType::SiemCloud => 209,
        }
    }

    /// The name users put in `product_type`.
    pub fn name(self) -> &'static str {
        match self {
            ProductType::FgtVmBundle => "FGT_VM_Bundle",
            ProductType::FmgVm => "FMG_VM",
            ProductType::FwbVm => "FWB_VM",
            ProductType::FgtVmLcs => "FGT_VM_LCS",
            ProductType::FcEmsOp => "FC_EMS_OP",
            ProductType::FazVm => "FAZ_VM",
            ProductType::FpcVm => "FPC_VM",
            ProductType::FadVm => "FAD_VM",
            ProductType::FgtHw => "FGT_HW",
            ProductType::FapHw => "FAP_HW",
            ProductType::FswHw => "FSW_HW",
            ProductType::FwbcPrivate => "FWBC_PRIVATE",
            ProductType::FwbcPublic => "FWBC_PUBLIC",
            ProductType::FcEmsCloud => "FC_EMS_CLOUD",
            ProductType::FortiSase => "FORTISASE",
            ProductType::FortiEdr => "FORTIEDR",
            ProductType::SiemCloud => "SIEM_CLOUD",
        }
    }

    /// The lowercase block key holding this product's parameters.
    pub fn block_name(self) -> &'static str {
        match self {
            ProductType::FgtVmBundle => "fgt_vm_bundle",
            ProductType::FmgVm => "fmg_vm",
            ProductType::FwbVm => "fwb_vm",
            ProductType::FgtVmLcs => "fgt_vm_lcs",
            ProductType::FcEmsOp => "fc_ems_op",
            ProductType::FazVm => "faz_vm",
            ProductType::FpcVm => "fpc_vm",
            ProductType::FadVm => "fad_vm",
            ProductType::FgtHw => "fgt_hw",
            ProductType::FapHw => "fap_hw",
            ProductType::FswHw => "fsw_hw",
            ProductType::FwbcPrivate => "fwbc_private",
            ProductType::FwbcPublic => "fwbc_public",
            ProductType::FcEmsCloud => "fc_ems_cloud",
            ProductType::FortiSase => "fortisase",
            ProductType::FortiEdr => "fortiedr",
            ProductType::SiemCloud => "siem_cloud",
        }
    }

    /// Look up a product by its user-facing name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }

    /// Look up a product by its wire id.
    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.id() == id)
    }

    /// The parameters that belong to this product, aliases excluded.
    pub fn parameters(self) -> impl Iterator<Item = &'static ParameterDef> {
        PARAMETERS
            .iter()
            .filter(move |def| def.product == self && !def.alias)
    }

    /// The schema block for this product's parameters.
    ///
    /// Every field is optional and computed, since FortiFlex fills in the
    /// values the user leaves out.
    pub fn block_schema(self) -> Block {
        self.parameters().fold(
            Block::new().with_description(format!("Parameters of a {} configuration.", self.name())),
            |block, def| block.with_attribute(def.field, def.attribute()),
        )
    }

    /// Comma separated list of every product name, for error messages.
    pub fn valid_names() -> String {
        Self::ALL.iter().map(|p| p.name()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a parameter value is typed on the user side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// A plain string.
    Str,
    /// An integer, sent as its decimal string.
    Int,
    /// A list of strings, sent as one pair per element.
    List,
}

/// One row of the parameter table.
#[derive(Debug, Clone)]
pub struct ParameterDef {
    /// Wire id.
    pub id: i64,
    /// Owning product.
    pub product: ProductType,
    /// Field name inside the product block.
    pub field: &'static str,
    /// Value kind.
    pub kind: ParamKind,
    /// FortiFlex computes the value; it is never sent.
    pub read_only: bool,
    /// Superseded id kept for decoding responses only.
    pub alias: bool,
    /// Accepted values, if restricted.
    pub constraint: Option<Constraint>,
}

impl ParameterDef {
    /// The dotted `product.field` name used in messages.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.product.block_name(), self.field)
    }

    fn attribute(&self) -> Attribute {
        let attr_type = match self.kind {
            ParamKind::Str => AttributeType::String,
            ParamKind::Int => AttributeType::Int64,
            ParamKind::List => AttributeType::list(AttributeType::String),
        };
        let flags = if self.read_only {
            AttributeFlags::computed()
        } else {
            AttributeFlags::optional_computed()
        };
        let attr = Attribute::new(attr_type, flags);
        match &self.constraint {
            Some(constraint) => attr.with_constraint(constraint.clone()),
            None => attr,
        }
    }
}

fn def(id: i64, product: ProductType, field: &'static str, kind: ParamKind) -> ParameterDef {
    ParameterDef {
        id,
        product,
        field,
        kind,
        read_only: false,
        alias: false,
        constraint: None,
    }
}

impl ParameterDef {
    fn one_of(mut self, values: &[&'static str]) -> Self {
        self.constraint = Some(match self.kind {
            ParamKind::List => Constraint::EachOneOf(values.to_vec()),
            _ => Constraint::OneOf(values.to_vec()),
        });
        self
    }

    fn range(mut self, lower: i64, upper: i64) -> Self {
        self.constraint = Some(match self.kind {
            ParamKind::Str => Constraint::IntStringRange(lower, upper),
            _ => Constraint::IntRange(lower, upper),
        });
        self
    }

    fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    fn alias(mut self) -> Self {
        self.alias = true;
        self
    }
}

/// The parameter table, sorted by id.
pub static PARAMETERS: Lazy<Vec<ParameterDef>> = Lazy::new(|| {
    use ParamKind::{Int, List, Str};
    use ProductType::*;

    vec![
        def(1, FgtVmBundle, "cpu_size", Str).one_of(&["1", "2", "4", "8", "16", "32", "2147483647"]),
        def(2, FgtVmBundle, "service_pkg", Str).one_of(&["FC", "UTM", "ENT", "ATP"]),
        def(3, FmgVm, "managed_dev", Int).range(1, 100000).alias(),
        def(4, FwbVm, "cpu_size", Str).one_of(&["1", "2", "4", "8", "16"]),
        def(5, FwbVm, "service_pkg", Str).one_of(&["FWBSTD", "FWBADV"]),
        def(6, FgtVmLcs, "cpu_size", Str).range(1, 96),
        def(7, FgtVmLcs, "fortiguard_services", List)
            .one_of(&["IPS", "AVDB", "FURL", "IOTH", "FGSA", "ISSS"]),
        def(8, FgtVmLcs, "support_service", Str).one_of(&["FC247", "ASET"]),
        def(9, FmgVm, "adom_num", Int).range(1, 100000),
        def(10, FgtVmBundle, "vdom_num", Int).range(0, 500),
        def(11, FgtVmLcs, "vdom_num", Int).range(1, 500),
        def(12, FgtVmLcs, "cloud_services", List).one_of(&["FAMS", "SWNM", "FMGC", "AFAC"]),
        def(13, FcEmsOp, "ztna_num", Int),
        def(14, FcEmsOp, "epp_ztna_num", Int),
        def(15, FcEmsOp, "chromebook", Int),
        def(16, FcEmsOp, "support_service", Str),
        def(21, FazVm, "daily_storage", Int).range(5, 8300),
        def(22, FazVm, "adom_num", Int).range(0, 1200),
        def(23, FazVm, "support_service", Str).one_of(&["FAZFC247"]),
        def(24, FpcVm, "managed_dev", Int).range(0, 100000),
        def(25, FadVm, "cpu_size", Str),
        def(26, FadVm, "service_pkg", Str),
        def(27, FgtHw, "device_model", Str),
        def(28, FgtHw, "service_pkg", Str),
        def(29, FgtHw, "addons", List),
        def(30, FmgVm, "managed_dev", Int).range(1, 100000),
        def(32, FwbcPrivate, "average_throughput", Int),
        def(33, FwbcPrivate, "web_applications", Int),
        def(34, FwbcPublic, "average_throughput", Int),
        def(35, FwbcPublic, "web_applications", Int),
        def(36, FcEmsOp, "addons", List),
        def(37, FcEmsCloud, "ztna_num", Int),
        def(38, FcEmsCloud, "ztna_fgf_num", Int),
        def(39, FcEmsCloud, "epp_ztna_num", Int),
        def(40, FcEmsCloud, "epp_ztna_fgf_num", Int),
        def(41, FcEmsCloud, "chromebook", Int),
        def(42, FcEmsCloud, "addons", List),
        def(43, FgtVmBundle, "fortiguard_services", List),
        def(44, FgtVmBundle, "cloud_services", List),
        def(45, FgtVmBundle, "support_service", Str),
        def(46, FortiEdr, "service_pkg", Str),
        def(47, FortiEdr, "endpoints", Int).read_only(),
        def(48, FortiSase, "users", Int),
        def(49, FortiSase, "service_pkg", Str),
        def(50, FortiSase, "bandwidth", Int),
        def(51, FortiSase, "dedicated_ips", Int),
        def(52, FortiEdr, "addons", List),
        def(53, FswHw, "device_model", Str),
        def(54, FswHw, "service_pkg", Str),
        def(55, FapHw, "device_model", Str),
        def(56, FapHw, "service_pkg", Str),
        def(57, FapHw, "addons", List),
        def(58, FazVm, "addons", List),
        def(59, FortiSase, "additional_compute_region", Int),
        def(66, SiemCloud, "compute_units", Int),
        def(67, SiemCloud, "additional_online_storage", Int),
        def(68, SiemCloud, "archive_storage", Int),
    ]
});

/// Find a parameter by wire id. Aliases are included.
pub fn lookup_by_id(id: i64) -> Option<&'static ParameterDef> {
    PARAMETERS.iter().find(|def| def.id == id)
}

/// Find the parameter to send for `product.field`. Aliases are skipped.
pub fn lookup_by_name(product: ProductType, field: &str) -> Option<&'static ParameterDef> {
    product.parameters().find(|def| def.field == field)
}

/// One `{id, value}` pair as exchanged with FortiFlex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter id.
    pub id: i64,
    /// Value; the API sometimes answers with a JSON number here.
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
}

impl Parameter {
    /// Create a parameter pair.
    pub fn new(id: i64, value: impl Into<String>) -> Self {
        Self {
            id,
            value: value.into(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number parameter value, got {}",
            other
        ))),
    }
}

/// Encode a product block into parameter pairs.
///
/// Pairs come out in table order. Null and read-only fields are skipped.
/// An empty list is sent as a single [`NONE_VALUE`] pair.
pub fn encode(product: ProductType, fields: &Value) -> Result<Vec<Parameter>, ProviderError> {
    let fields = match fields {
        Value::Null => return Ok(Vec::new()),
        Value::Object(map) => map,
        other => {
            return Err(ProviderError::Validation(format!(
                "{} must be an object, got {}",
                product.block_name(),
                other
            )))
        },
    };

    if let Some(unknown) = fields
        .keys()
        .find(|name| lookup_by_name(product, name).is_none())
    {
        return Err(ProviderError::Validation(format!(
            "Unknown parameter {}.{}",
            product.block_name(),
            unknown
        )));
    }

    let mut params = Vec::new();
    for def in product.parameters() {
        if def.read_only {
            continue;
        }
        let value = match fields.get(def.field) {
            None | Some(Value::Null) => continue,
            Some(value) => value,
        };
        match def.kind {
            ParamKind::List => {
                let items = value.as_array().ok_or_else(|| type_mismatch(def, "a list", value))?;
                if items.is_empty() {
                    params.push(Parameter::new(def.id, NONE_VALUE));
                    continue;
                }
                for item in items {
                    let item = item
                        .as_str()
                        .ok_or_else(|| type_mismatch(def, "a list of strings", value))?;
                    if let Some(Constraint::EachOneOf(valid)) = &def.constraint {
                        if !valid.iter().any(|v| *v == item) {
                            return Err(ProviderError::Validation(format!(
                                "Invalid {} input {}\nValid values (you can select multiple values): [{}]",
                                def.qualified_name(),
                                item,
                                valid.join(" ")
                            )));
                        }
                    }
                    params.push(Parameter::new(def.id, item));
                }
            },
            ParamKind::Int => {
                let number = match value {
                    Value::Number(n) => n.as_i64().map(|i| i.to_string()),
                    Value::String(s) => s.trim().parse::<i64>().ok().map(|i| i.to_string()),
                    _ => None,
                }
                .ok_or_else(|| type_mismatch(def, "an integer", value))?;
                params.push(Parameter::new(def.id, number));
            },
            ParamKind::Str => {
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    _ => return Err(type_mismatch(def, "a string", value)),
                };
                params.push(Parameter::new(def.id, text));
            },
        }
    }
    Ok(params)
}

fn type_mismatch(def: &ParameterDef, expected: &str, got: &Value) -> ProviderError {
    ProviderError::Validation(format!(
        "{} must be {}, got {}",
        def.qualified_name(),
        expected,
        got
    ))
}

/// Decode parameter pairs into a product block.
///
/// Repeated list ids are collected in order and [`NONE_VALUE`] yields an
/// empty list. Ids not in the table are skipped; an id of another product is
/// an error.
pub fn decode(product: ProductType, params: &[Parameter]) -> Result<Value, ProviderError> {
    let mut out = Map::new();
    for param in params {
        let Some(def) = lookup_by_id(param.id) else {
            warn!(id = param.id, product = %product, "Skipping unknown parameter id");
            continue;
        };
        if def.product != product {
            return Err(ProviderError::InvalidRequest(format!(
                "Got parameter id {} ({}) on a {} configuration",
                param.id,
                def.qualified_name(),
                product
            )));
        }
        match def.kind {
            ParamKind::List => {
                let entry = out
                    .entry(def.field.to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if param.value != NONE_VALUE {
                    if let Value::Array(items) = entry {
                        items.push(Value::String(param.value.clone()));
                    }
                }
            },
            ParamKind::Int => {
                let value = match param.value.trim().parse::<i64>() {
                    Ok(number) => Value::from(number),
                    Err(_) => {
                        warn!(id = param.id, value = %param.value, "Parameter value is not an integer");
                        Value::String(param.value.clone())
                    },
                };
                out.insert(def.field.to_string(), value);
            },
            ParamKind::Str => {
                out.insert(def.field.to_string(), Value::String(param.value.clone()));
            },
        }
    }
    Ok(Value::Object(out))
}

static PARAMETER_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Parameter id (\d+)").unwrap_or_else(|_| unreachable!("pattern is a literal"))
});

/// Rewrite `Parameter id N` in an API message to `Parameter field`, e.g.
/// `Parameter id 9` becomes `Parameter adom_num`.
///
/// Ids not in the table are left as they are.
pub fn humanize_api_message(message: &str) -> String {
    PARAMETER_ID
        .replace_all(message, |caps: &Captures<'_>| {
            caps[1]
                .parse::<i64>()
                .ok()
                .and_then(lookup_by_id)
                .map(|def| format!("Parameter {}", def.field))
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_product_lookups() {
        assert_eq!(ProductType::from_name("FGT_VM_Bundle"), Some(ProductType::FgtVmBundle));
        assert_eq!(ProductType::from_name("fgt_vm_bundle"), None);
        assert_eq!(ProductType::from_id(209), Some(ProductType::SiemCloud));
        assert_eq!(ProductType::from_id(6), None);
        assert_eq!(ProductType::FortiSase.block_name(), "fortisase");

        for product in ProductType::ALL {
            assert_eq!(ProductType::from_id(product.id()), Some(product));
            assert_eq!(ProductType::from_name(product.name()), Some(product));
        }
    }

    #[test]
    fn test_table_ids_are_unique_and_sorted() {
        let ids: Vec<i64> = PARAMETERS.iter().map(|d| d.id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_managed_dev_alias() {
        assert_eq!(lookup_by_name(ProductType::FmgVm, "managed_dev").map(|d| d.id), Some(30));
        assert_eq!(lookup_by_id(3).map(|d| d.field), Some("managed_dev"));

        let decoded = decode(
            ProductType::FmgVm,
            &[Parameter::new(3, "10"), Parameter::new(9, "2")],
        )
        .unwrap();
        assert_eq!(decoded, json!({"managed_dev": 10, "adom_num": 2}));
    }

    #[test]
    fn test_encode_bundle() {
        let params = encode(
            ProductType::FgtVmBundle,
            &json!({
                "cpu_size": "4",
                "service_pkg": "UTM",
                "vdom_num": 10,
                "fortiguard_services": ["FGTAVDB", "FGTFAIS"],
                "cloud_services": [],
                "support_service": null
            }),
        )
        .unwrap();

        assert_eq!(
            params,
            vec![
                Parameter::new(1, "4"),
                Parameter::new(2, "UTM"),
                Parameter::new(10, "10"),
                Parameter::new(43, "FGTAVDB"),
                Parameter::new(43, "FGTFAIS"),
                Parameter::new(44, NONE_VALUE),
            ]
        );
    }

    #[test]
    fn test_encode_rejects_unknown_field() {
        let err = encode(ProductType::FwbVm, &json!({"vdom_num": 2})).unwrap_err();
        assert!(err.to_string().contains("Unknown parameter fwb_vm.vdom_num"));
    }

    #[test]
    fn test_encode_rejects_invalid_list_element() {
        let err = encode(
            ProductType::FgtVmLcs,
            &json!({"fortiguard_services": ["IPS", "XYZ"]}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid fgt_vm_lcs.fortiguard_services input XYZ"));
    }

    #[test]
    fn test_encode_skips_read_only() {
        let params = encode(
            ProductType::FortiEdr,
            &json!({"service_pkg": "FEDRPDR", "endpoints": 50, "addons": ["FEDRXDR"]}),
        )
        .unwrap();
        assert!(params.iter().all(|p| p.id != 47));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_decode_lists_and_none() {
        let decoded = decode(
            ProductType::FgtVmLcs,
            &[
                Parameter::new(6, "8"),
                Parameter::new(7, "IPS"),
                Parameter::new(7, "AVDB"),
                Parameter::new(12, NONE_VALUE),
                Parameter::new(11, "5"),
            ],
        )
        .unwrap();

        assert_eq!(
            decoded,
            json!({
                "cpu_size": "8",
                "fortiguard_services": ["IPS", "AVDB"],
                "cloud_services": [],
                "vdom_num": 5
            })
        );
    }

    #[test]
    fn test_decode_rejects_foreign_parameter() {
        let err = decode(ProductType::FazVm, &[Parameter::new(1, "2")]).unwrap_err();
        assert!(err.to_string().contains("fgt_vm_bundle.cpu_size"));
    }

    #[test]
    fn test_decode_skips_unknown_ids() {
        let decoded = decode(
            ProductType::FortiSase,
            &[Parameter::new(48, "50"), Parameter::new(72, "2")],
        )
        .unwrap();
        assert_eq!(decoded, json!({"users": 50}));
    }

    #[test]
    fn test_parameter_value_accepts_numbers() {
        let param: Parameter = serde_json::from_value(json!({"id": 9, "value": 3})).unwrap();
        assert_eq!(param, Parameter::new(9, "3"));
    }

    #[test]
    fn test_humanize_api_message() {
        assert_eq!(
            humanize_api_message("Parameter id 2 is invalid; parameter ID 999 ignored"),
            "Parameter service_pkg is invalid; parameter ID 999 ignored"
        );
        assert_eq!(humanize_api_message("no parameters here"), "no parameters here");
    }

    #[test]
    fn test_block_schema_attributes() {
        let block = ProductType::FortiEdr.block_schema();
        assert!(block.attributes["endpoints"].flags.computed);
        assert!(!block.attributes["endpoints"].flags.optional);
        assert!(block.attributes["service_pkg"].flags.optional);

        let fmg = ProductType::FmgVm.block_schema();
        assert_eq!(fmg.attributes.len(), 2);
        assert_eq!(
            fmg.attributes["managed_dev"].constraints,
            vec![Constraint::IntRange(1, 100000)]
        );
    }
}
