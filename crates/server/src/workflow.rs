//! B2B member registration workflow.
//!
//! Registration is a chain of Admin API mutations, deliberately not a
//! transaction: each step commits on Shopify's side as it lands, and a later
//! failure leaves the earlier ones in place. The storefront re-renders the
//! form with the failure so the merchant can retry.
//!
//! Steps:
//! 1. `customerUpdate` writes the member's contact data onto the customer.
//! 2. When the customer already belongs to companies, each gets a new
//!    location plus role assignment, fanned out as unawaited tasks.
//! 3. Otherwise a company is created, the customer attached as contact, and
//!    the buyer role assigned to the new location, strictly in that order.

use burst_core::{CustomerProbe, MemberRegistration};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::shopify::{AdminGateway, ShopifyError};

const RICH_CUSTOMER_QUERY: &str = r"query($id: ID!) {
  customer(id: $id) {
    email
    firstName
    lastName
    phone
    addresses(first: 10) {
      city
      address1
      address2
      company
      countryCode
      firstName
      lastName
      phone
      provinceCode
      zip
    }
    companyContactProfiles {
      company {
        id
        name
        contactRoles(first: 10, reverse: true) {
          nodes {
            id
            name
          }
        }
        contacts(first: 10, reverse: true) {
          nodes {
            id
            title
          }
        }
        locations(first: 10, reverse: true) {
          nodes {
            id
            shippingAddress {
              address1
              address2
              city
              countryCode
              recipient
              zip
              zoneCode
              phone
            }
            billingAddress {
              address1
              address2
              city
              countryCode
              recipient
              zip
              zoneCode
              phone
            }
          }
        }
      }
    }
  }
}";

const REDUCED_CUSTOMER_QUERY: &str = r"query($id: ID!) {
  customer(id: $id) {
    email
    firstName
    lastName
    phone
    addresses(first: 10) {
      city
      address1
      address2
      company
      countryCode
      firstName
      lastName
      phone
      provinceCode
      zip
    }
  }
}";

const CUSTOMER_UPDATE: &str = r"mutation customerUpdate($input: CustomerInput!) {
  customerUpdate(input: $input) {
    customer {
      id
      addresses(first: 1) {
        id
      }
    }
    userErrors {
      field
      message
    }
  }
}";

const COMPANY_LOCATION_CREATE: &str =
    r"mutation companyLocationCreate($companyId: ID!, $input: CompanyLocationInput!) {
  companyLocationCreate(companyId: $companyId, input: $input) {
    companyLocation {
      id
    }
    userErrors {
      field
      message
    }
  }
}";

const COMPANY_LOCATION_ASSIGN_ROLES: &str =
    r"mutation companyLocationAssignRoles($companyLocationId: ID!, $rolesToAssign: [CompanyLocationRoleAssign!]!) {
  companyLocationAssignRoles(companyLocationId: $companyLocationId, rolesToAssign: $rolesToAssign) {
    roleAssignments {
      id
    }
    userErrors {
      field
      message
    }
  }
}";

const COMPANY_CREATE: &str = r"mutation companyCreate($input: CompanyCreateInput!) {
  companyCreate(input: $input) {
    company {
      id
      locations(first: 1, reverse: true) {
        nodes {
          id
          name
        }
      }
      contactRoles(first: 2, reverse: true) {
        nodes {
          id
          name
        }
      }
    }
    userErrors {
      field
      message
    }
  }
}";

const COMPANY_ASSIGN_CUSTOMER_AS_CONTACT: &str =
    r"mutation companyAssignCustomerAsContact($companyId: ID!, $customerId: ID!) {
  companyAssignCustomerAsContact(companyId: $companyId, customerId: $customerId) {
    companyContact {
      id
    }
    userErrors {
      field
      message
    }
  }
}";

/// Outcome rendered back into the registration form.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitStatus {
    pub success: bool,
    pub message: String,
}

impl SubmitStatus {
    /// Success carries the member email as confirmation.
    #[must_use]
    pub fn success(email: &str) -> Self {
        Self {
            success: true,
            message: email.to_string(),
        }
    }

    #[must_use]
    pub fn error(detail: &str) -> Self {
        Self {
            success: false,
            message: detail.to_string(),
        }
    }
}

/// Probe the customer with the full B2B query, then once more without the
/// company fields when the shop rejects them. Returns `None` when neither
/// probe yields a customer.
pub async fn probe_customer(
    gateway: &AdminGateway,
    shop: &str,
    customer_id: &str,
) -> Option<CustomerProbe> {
    match fetch_customer(gateway, shop, customer_id, RICH_CUSTOMER_QUERY).await {
        Some(probe) => Some(probe),
        None => {
            tracing::info!(%shop, "rich customer probe failed, retrying without B2B fields");
            fetch_customer(gateway, shop, customer_id, REDUCED_CUSTOMER_QUERY).await
        }
    }
}

async fn fetch_customer(
    gateway: &AdminGateway,
    shop: &str,
    customer_id: &str,
    query: &str,
) -> Option<CustomerProbe> {
    let variables = serde_json::json!({
        "id": format!("gid://shopify/Customer/{customer_id}"),
    });
    let body = gateway
        .dispatch(shop, query, Some(variables), None)
        .await
        .ok()?;

    // Top-level errors mean the query itself was rejected (e.g., B2B fields
    // on a shop without the feature).
    if body
        .get("errors")
        .and_then(serde_json::Value::as_array)
        .is_some_and(|errors| !errors.is_empty())
    {
        return None;
    }

    let customer = body.pointer("/data/customer")?;
    if customer.is_null() {
        return None;
    }
    serde_json::from_value(customer.clone()).ok()
}

/// Run the registration chain for one member.
///
/// # Errors
///
/// Returns the first [`ShopifyError`] from an awaited step. Failures inside
/// the per-company fan-out are logged, not returned; those tasks outlive
/// this call.
pub async fn run_submit(
    gateway: &AdminGateway,
    shop: &str,
    customer_id: &str,
    member: &MemberRegistration,
    probe: &CustomerProbe,
) -> Result<(), ShopifyError> {
    gateway
        .dispatch(
            shop,
            CUSTOMER_UPDATE,
            Some(member.customer_update_input(customer_id)),
            None,
        )
        .await?;

    // Company steps need the B2B feature; the reduced probe means the shop
    // does not have it.
    if !probe.has_company_support() {
        return Ok(());
    }

    let location_input = member.company_location_input();

    if probe.profiles().is_empty() {
        create_company(gateway, shop, customer_id, member, location_input).await
    } else {
        for profile in probe.profiles() {
            let company_id = profile.company.id.clone();
            let contact_id = profile
                .company
                .contacts
                .nodes
                .first()
                .map(|contact| contact.id.clone());
            let role_id = profile
                .company
                .contact_roles
                .nodes
                .first()
                .map(|role| role.id.clone());

            spawn_location_for_company(
                gateway.clone(),
                shop.to_string(),
                company_id,
                contact_id,
                role_id,
                location_input.clone(),
            );
        }
        Ok(())
    }
}

/// Add a location to an existing company and assign the buyer role.
///
/// Runs detached: the storefront response does not wait for these, matching
/// the best-effort nature of backfilling locations onto companies the
/// customer already belongs to.
fn spawn_location_for_company(
    gateway: AdminGateway,
    shop: String,
    company_id: String,
    contact_id: Option<String>,
    role_id: Option<String>,
    location_input: serde_json::Value,
) {
    tokio::spawn(async move {
        let created = gateway
            .dispatch(
                &shop,
                COMPANY_LOCATION_CREATE,
                Some(serde_json::json!({
                    "companyId": company_id,
                    "input": location_input,
                })),
                None,
            )
            .await;

        let location_id = match created.as_ref().map(|body| {
            body.pointer("/data/companyLocationCreate/companyLocation/id")
                .and_then(|v| v.as_str())
        }) {
            Ok(Some(id)) => id.to_string(),
            Ok(None) => {
                tracing::warn!(%shop, %company_id, "companyLocationCreate returned no location");
                return;
            }
            Err(err) => {
                tracing::warn!(%shop, %company_id, error = %err, "companyLocationCreate failed");
                return;
            }
        };

        let (Some(contact_id), Some(role_id)) = (contact_id, role_id) else {
            tracing::warn!(%shop, %company_id, "company has no contact or role to assign");
            return;
        };

        if let Err(err) = gateway
            .dispatch(
                &shop,
                COMPANY_LOCATION_ASSIGN_ROLES,
                Some(serde_json::json!({
                    "companyLocationId": location_id,
                    "rolesToAssign": [{
                        "companyContactId": contact_id,
                        "companyContactRoleId": role_id,
                    }],
                })),
                None,
            )
            .await
        {
            tracing::warn!(%shop, %company_id, error = %err, "companyLocationAssignRoles failed");
        }
    });
}

/// Create a company with its first location, attach the customer as contact
/// and assign the buyer role. Strictly sequential: each step consumes ids
/// from the previous response.
async fn create_company(
    gateway: &AdminGateway,
    shop: &str,
    customer_id: &str,
    member: &MemberRegistration,
    location_input: serde_json::Value,
) -> Result<(), ShopifyError> {
    let created = gateway
        .dispatch(
            shop,
            COMPANY_CREATE,
            Some(serde_json::json!({
                "input": {
                    "company": {
                        "customerSince": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                        "externalId": member.b2b_member_id,
                        "name": member.company_name,
                        "note": member.company_note(),
                    },
                    "companyLocation": location_input,
                }
            })),
            None,
        )
        .await?;

    let company_id = require_str(&created, "/data/companyCreate/company/id")?;
    let location_id = require_str(&created, "/data/companyCreate/company/locations/nodes/0/id")?;
    let role_id = require_str(&created, "/data/companyCreate/company/contactRoles/nodes/0/id")?;

    let assigned = gateway
        .dispatch(
            shop,
            COMPANY_ASSIGN_CUSTOMER_AS_CONTACT,
            Some(serde_json::json!({
                "companyId": company_id,
                "customerId": format!("gid://shopify/Customer/{customer_id}"),
            })),
            None,
        )
        .await?;

    let contact_id = require_str(
        &assigned,
        "/data/companyAssignCustomerAsContact/companyContact/id",
    )?;

    gateway
        .dispatch(
            shop,
            COMPANY_LOCATION_ASSIGN_ROLES,
            Some(serde_json::json!({
                "companyLocationId": location_id,
                "rolesToAssign": [{
                    "companyContactId": contact_id,
                    "companyContactRoleId": role_id,
                }],
            })),
            None,
        )
        .await?;

    Ok(())
}

fn require_str(body: &serde_json::Value, pointer: &str) -> Result<String, ShopifyError> {
    body.pointer(pointer)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| ShopifyError::UnexpectedResponse(format!("missing {pointer}")))
}
