//! Member-data resolution for the B2B registration workflow.
//!
//! Registration merges two sources into one [`MemberRegistration`]: explicit
//! form parameters and a customer probe fetched from the Admin API. A
//! parameter that is *present* always wins, even when empty, so an operator
//! can deliberately blank a probed value. Absent parameters fall back to the
//! probe where a mapping exists, then to a literal default, then to the
//! empty string.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::geo;

/// Marker prepended to the member id inside the shipping address line.
pub const MEMBER_ID_NOTE: &str = "会員ID：";

/// One page of a GraphQL connection, `nodes` only.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Nodes<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<T>,
}

/// Company location address as returned by the Admin API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyAddress {
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub recipient: Option<String>,
    pub zip: Option<String>,
    pub zone_code: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyLocation {
    pub id: String,
    pub shipping_address: Option<CompanyAddress>,
    pub billing_address: Option<CompanyAddress>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleNode {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactNode {
    pub id: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub contact_roles: Nodes<RoleNode>,
    #[serde(default)]
    pub contacts: Nodes<ContactNode>,
    #[serde(default)]
    pub locations: Nodes<CompanyLocation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompanyContactProfile {
    pub company: Company,
}

/// Customer snapshot from the Admin API probe.
///
/// The rich probe includes `companyContactProfiles`; on non-Plus shops the
/// query is retried without B2B fields and the field stays `None`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerProbe {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub company_contact_profiles: Option<Vec<CompanyContactProfile>>,
}

impl CustomerProbe {
    /// Profiles, or an empty slice when the reduced probe was used.
    #[must_use]
    pub fn profiles(&self) -> &[CompanyContactProfile] {
        self.company_contact_profiles.as_deref().unwrap_or_default()
    }

    /// True when the probe carried the B2B company fields at all.
    /// Distinct from having zero profiles: the reduced probe means the shop
    /// may not support companies, zero profiles means it does but this
    /// customer has none yet.
    #[must_use]
    pub fn has_company_support(&self) -> bool {
        self.company_contact_profiles.is_some()
    }

    fn first_location(&self) -> Option<&CompanyLocation> {
        self.profiles().first()?.company.locations.nodes.first()
    }

    fn billing_address(&self) -> Option<&CompanyAddress> {
        self.first_location()?.billing_address.as_ref()
    }

    fn shipping_address(&self) -> Option<&CompanyAddress> {
        self.first_location()?.shipping_address.as_ref()
    }

    fn first_company_name(&self) -> Option<&str> {
        self.profiles().first()?.company.name.as_deref()
    }
}

/// Shipping recipient overrides, submitted under `recipientData_*` keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecipientData {
    pub company_name: String,
    pub company_name_kana: String,
    pub representative_sei: String,
    pub representative_mei: String,
    pub representative_sei_kana: String,
    pub representative_mei_kana: String,
    pub zip_code: String,
    pub prefecture: String,
    pub address1: String,
    pub address2: String,
    pub address3: String,
    pub tel: String,
    pub fax: String,
    pub mobile_tel: String,
}

/// Fully resolved registration data for one member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemberRegistration {
    pub b2b_member_id: String,
    pub email: String,
    pub company_name: String,
    pub company_name_kana: String,
    pub representative_sei: String,
    pub representative_mei: String,
    pub representative_sei_kana: String,
    pub representative_mei_kana: String,
    pub zip_code: String,
    pub prefecture: String,
    pub address1: String,
    pub address2: String,
    pub address3: String,
    pub aux_name: String,
    pub clerk_sei: String,
    pub clerk_mei: String,
    pub clerk_sei_kana: String,
    pub clerk_mei_kana: String,
    pub tel: String,
    pub fax: String,
    pub mobile_tel: String,
    pub url1: String,
    pub url2: String,
    pub url3: String,
    pub closing_day: String,
    pub payment_method: String,
    pub frd_key: String,
    pub recipient: RecipientData,
}

impl MemberRegistration {
    /// Resolve registration data from form parameters and a customer probe.
    ///
    /// Precedence per field: present parameter, probe-derived value where a
    /// mapping exists, literal default, empty string. The email always comes
    /// from the probe since the member account is keyed on it.
    #[must_use]
    pub fn resolve(params: &BTreeMap<String, String>, probe: &CustomerProbe) -> Self {
        let pick = |key: &str, fallback: &dyn Fn() -> String| -> String {
            params
                .get(key)
                .cloned()
                .unwrap_or_else(|| fallback())
        };
        let plain = |key: &str| pick(key, &String::new);
        let billing = |field: &dyn Fn(&CompanyAddress) -> Option<String>| -> String {
            probe
                .billing_address()
                .and_then(field)
                .unwrap_or_default()
        };
        let shipping = |field: &dyn Fn(&CompanyAddress) -> Option<String>| -> String {
            probe
                .shipping_address()
                .and_then(field)
                .unwrap_or_default()
        };

        Self {
            b2b_member_id: pick("b2bMemberId", &default_member_id),
            email: probe.email.clone().unwrap_or_default(),
            company_name: pick("companyName", &|| {
                probe.first_company_name().unwrap_or_default().to_string()
            }),
            company_name_kana: plain("companyNameKana"),
            representative_sei: plain("representativeSei"),
            representative_mei: plain("representativeMei"),
            representative_sei_kana: plain("representativeSeiKana"),
            representative_mei_kana: plain("representativeMeiKana"),
            zip_code: pick("zipCode", &|| billing(&|a| a.zip.clone())),
            prefecture: pick("prefecture", &|| {
                billing(&|a| a.zone_code.as_deref().map(geo::prefecture_name))
            }),
            address1: pick("address1", &|| billing(&|a| a.city.clone())),
            address2: pick("address2", &|| billing(&|a| a.address1.clone())),
            address3: pick("address3", &|| billing(&|a| a.address2.clone())),
            aux_name: plain("auxName"),
            clerk_sei: pick("clerkSei", &|| {
                probe.last_name.clone().unwrap_or_default()
            }),
            clerk_mei: pick("clerkMei", &|| {
                probe.first_name.clone().unwrap_or_default()
            }),
            clerk_sei_kana: plain("clerkSeiKana"),
            clerk_mei_kana: plain("clerkMeiKana"),
            tel: pick("tel", &|| {
                billing(&|a| a.phone.as_deref().map(geo::localize_phone))
            }),
            fax: plain("fax"),
            mobile_tel: plain("mobileTel"),
            url1: plain("url1"),
            url2: plain("url2"),
            url3: plain("url3"),
            closing_day: pick("closingDay", &|| "31".to_string()),
            payment_method: pick("paymentMethod", &|| "1".to_string()),
            frd_key: plain("frdKey"),
            recipient: RecipientData {
                company_name: plain("recipientData_companyName"),
                company_name_kana: plain("recipientData_companyNameKana"),
                representative_sei: plain("recipientData_representativeSei"),
                representative_mei: plain("recipientData_representativeMei"),
                representative_sei_kana: plain("recipientData_representativeSeiKana"),
                representative_mei_kana: plain("recipientData_representativeMeiKana"),
                zip_code: pick("recipientData_zipCode", &|| {
                    shipping(&|a| a.zip.clone())
                }),
                prefecture: pick("recipientData_prefecture", &|| {
                    shipping(&|a| a.zone_code.as_deref().map(geo::prefecture_name))
                }),
                address1: pick("recipientData_address1", &|| {
                    shipping(&|a| a.city.clone())
                }),
                address2: pick("recipientData_address2", &|| {
                    shipping(&|a| a.address1.clone())
                }),
                address3: pick("recipientData_address3", &|| {
                    shipping(&|a| a.address2.clone())
                }),
                tel: pick("recipientData_tel", &|| {
                    shipping(&|a| a.phone.as_deref().map(geo::localize_phone))
                }),
                fax: plain("recipientData_fax"),
                mobile_tel: plain("recipientData_mobileTel"),
            },
        }
    }

    /// `CustomerInput` variables for the `customerUpdate` mutation.
    ///
    /// The member form's address lines 1-3 map onto Shopify's
    /// city/address1/address2 fields; that offset is intentional.
    #[must_use]
    pub fn customer_update_input(&self, customer_id: &str) -> serde_json::Value {
        serde_json::json!({
            "input": {
                "id": format!("gid://shopify/Customer/{customer_id}"),
                "firstName": self.clerk_mei,
                "lastName": self.clerk_sei,
                "phone": self.tel,
                "addresses": [{
                    "city": self.address1,
                    "address1": self.address2,
                    "address2": self.address3,
                    "company": self.company_name,
                    "countryCode": "JP",
                    "firstName": self.clerk_mei,
                    "lastName": self.clerk_sei,
                    "phone": self.tel,
                    "provinceCode": geo::province_code(&self.prefecture).unwrap_or_default(),
                    "zip": self.zip_code,
                }],
            }
        })
    }

    /// `CompanyLocationInput` variables shared by company create and update.
    ///
    /// Billing comes from the member block; shipping prefers the recipient
    /// block and falls back field by field. The member id is appended to the
    /// shipping address so warehouse labels carry it.
    #[must_use]
    pub fn company_location_input(&self) -> serde_json::Value {
        let r = &self.recipient;
        let or_member = |recipient_value: &str, member_value: &str| -> String {
            if recipient_value.is_empty() {
                member_value.to_string()
            } else {
                recipient_value.to_string()
            }
        };
        let shipping_prefecture = or_member(&r.prefecture, &self.prefecture);

        serde_json::json!({
            "billingAddress": {
                "address1": self.address2,
                "address2": self.address3,
                "city": self.address1,
                "countryCode": "JP",
                "recipient": format!("{} {}", self.clerk_sei, self.clerk_mei),
                "zip": self.zip_code,
                "zoneCode": geo::province_code(&self.prefecture).unwrap_or_default(),
                "phone": self.tel,
            },
            "externalId": self.b2b_member_id,
            "name": self.company_name,
            "note": self.company_note(),
            "phone": self.tel,
            "shippingAddress": {
                "address1": or_member(&r.address2, &self.address2),
                "address2": format!(
                    "{} {}{}",
                    or_member(&r.address3, &self.address3),
                    MEMBER_ID_NOTE,
                    self.b2b_member_id,
                ),
                "city": or_member(&r.address1, &self.address1),
                "countryCode": "JP",
                "recipient": format!("{} {}", r.representative_sei, r.representative_mei),
                "zip": or_member(&r.zip_code, &self.zip_code),
                "zoneCode": geo::province_code(&shipping_prefecture).unwrap_or_default(),
                "phone": or_member(&r.tel, &self.tel),
            },
        })
    }

    /// Free-text note naming the representative and the clerk in charge.
    #[must_use]
    pub fn company_note(&self) -> String {
        format!(
            "{} {} 担当者：{} {}",
            self.representative_sei, self.representative_mei, self.clerk_sei, self.clerk_mei,
        )
    }
}

/// Millisecond-clock member id, `M`-prefixed. Collisions across concurrent
/// registrations are tolerated; the backend enforces uniqueness.
fn default_member_id() -> String {
    format!("M{}", Utc::now().timestamp_millis())
}
