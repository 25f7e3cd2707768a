use std::sync::Arc;

use credit_common::Amount;
use graphql_parser::parse_query;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    config::ShopifyConfig,
    data_objects::{CustomerRef, GiftCard, GiftCardRequest, OrderDetails, StoreCreditTransaction},
    helpers::collect_user_errors,
    ShopifyApiError,
};

#[derive(Clone)]
pub struct ShopifyApi {
    config: ShopifyConfig,
    client: Arc<Client>,
}

const ORDER_QUERY: &str = r#"
query OrderCredit($id: ID!) {
  order(id: $id) {
    id
    name
    createdAt
    customer { id email }
    currencyCode
    subtotalPriceSet { shopMoney { amount currencyCode } }
    totalPriceSet { shopMoney { amount currencyCode } }
    displayFinancialStatus
    cancelledAt
    metafields(first: 25, namespace: "sqwad") { edges { node { key value } } }
    customAttributes { key value }
  }
}"#;

const CUSTOMER_BY_EMAIL_QUERY: &str = r#"
query CustomerByEmail($email: String!) {
  customerByIdentifier(identifier: { emailAddress: $email }) { id email }
}"#;

const CUSTOMER_EMAIL_QUERY: &str = r#"
query CustomerEmail($id: ID!) {
  customer(id: $id) { id email }
}"#;

const CUSTOMER_CREATE_MUTATION: &str = r#"
mutation CreateCustomer($input: CustomerInput!) {
  customerCreate(input: $input) {
    customer { id email }
    userErrors { field message }
  }
}"#;

const STORE_CREDIT_MUTATION: &str = r#"
mutation CreditAccount($id: ID!, $creditInput: StoreCreditAccountCreditInput!) {
  storeCreditAccountCredit(id: $id, creditInput: $creditInput) {
    storeCreditAccountTransaction { id amount { amount currencyCode } }
    userErrors { field message }
  }
}"#;

const GIFT_CARD_MUTATION: &str = r#"
mutation IssueGiftCard($input: GiftCardCreateInput!, $idemp: String!) {
  giftCardCreate(input: $input, idempotencyKey: $idemp) {
    giftCard { id codeMasked balance { amount currencyCode } }
    userErrors { field message }
  }
}"#;

impl ShopifyApi {
    pub fn new(config: ShopifyConfig) -> Result<Self, ShopifyApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let val = HeaderValue::from_str(config.admin_access_token.reveal().as_str())
            .map_err(|e| ShopifyApiError::Initialization(e.to_string()))?;
        headers.insert("X-Shopify-Access-Token", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ShopifyApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn shop(&self) -> &str {
        self.config.shop.as_str()
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<B>,
    ) -> Result<T, ShopifyApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ShopifyApiError::Timeout(e.to_string())
            } else {
                ShopifyApiError::RestResponseError(e.to_string())
            }
        })?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| ShopifyApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| ShopifyApiError::RestResponseError(e.to_string()))?;
            Err(ShopifyApiError::QueryError { status, message })
        }
    }

    /// Sends a GraphQL document to the Admin API.
    ///
    /// A 200 response is not enough for success: top-level `errors` and any non-empty `userErrors` list under a
    /// top-level field of `data` are both reported as errors.
    pub async fn graphql_query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Option<Value>,
    ) -> Result<T, ShopifyApiError> {
        let query = parse_query::<String>(query).map_err(|e| ShopifyApiError::InvalidGraphQL(e.to_string()))?;
        let mut body = json!({
            "query": query.to_string(),
        });
        if let Some(vars) = variables {
            body["variables"] = vars;
        }
        trace!("Sending GraphQL query: {body}");
        let result = self.rest_query::<Value, Value>(Method::POST, "/graphql.json", &[], Some(body)).await?;
        if let Some(errors) = result["errors"].as_array() {
            let e = errors.iter().map(|e| e.to_string()).collect::<Vec<String>>().join(", ");
            return Err(ShopifyApiError::GraphQLError(e));
        }
        let data = result["data"].clone();
        let costs = result["extensions"]["cost"].clone();
        trace!("GraphQL response: {data}");
        trace!("GraphQL costs: {costs}");
        if data.is_null() {
            return Err(ShopifyApiError::EmptyResponse);
        }
        let user_errors = collect_user_errors(&data);
        if !user_errors.is_empty() {
            return Err(ShopifyApiError::UserErrors(user_errors.join("; ")));
        }
        let result = serde_json::from_value(data).map_err(|e| ShopifyApiError::JsonError(e.to_string()))?;
        Ok(result)
    }

    pub fn url(&self, path: &str) -> String {
        format!("https://{}/admin/api/{}{path}", self.config.shop, self.config.api_version)
    }

    /// Fetches the authoritative order. Returns `None` if Shopify does not know the order.
    pub async fn fetch_order(&self, order_gid: &str) -> Result<Option<OrderDetails>, ShopifyApiError> {
        #[derive(Deserialize)]
        struct OrderResponse {
            order: Option<OrderDetails>,
        }
        debug!("🛍️ Fetching order {order_gid} from {}", self.shop());
        let result = self.graphql_query::<OrderResponse>(ORDER_QUERY, Some(json!({ "id": order_gid }))).await?;
        Ok(result.order)
    }

    pub async fn find_customer_by_email(&self, email: &str) -> Result<Option<String>, ShopifyApiError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct CustomerResponse {
            customer_by_identifier: Option<CustomerRef>,
        }
        let vars = json!({ "email": email });
        let result = self.graphql_query::<CustomerResponse>(CUSTOMER_BY_EMAIL_QUERY, Some(vars)).await?;
        Ok(result.customer_by_identifier.map(|c| c.id))
    }

    pub async fn customer_email(&self, customer_gid: &str) -> Result<Option<String>, ShopifyApiError> {
        #[derive(Deserialize)]
        struct CustomerResponse {
            customer: Option<CustomerRef>,
        }
        let vars = json!({ "id": customer_gid });
        let result = self.graphql_query::<CustomerResponse>(CUSTOMER_EMAIL_QUERY, Some(vars)).await?;
        Ok(result.customer.and_then(|c| c.email))
    }

    pub async fn create_customer(&self, email: &str) -> Result<String, ShopifyApiError> {
        #[derive(Deserialize)]
        struct Payload {
            customer: Option<CustomerRef>,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct CreateResponse {
            customer_create: Payload,
        }
        let vars = json!({ "input": { "email": email } });
        let result = self.graphql_query::<CreateResponse>(CUSTOMER_CREATE_MUTATION, Some(vars)).await?;
        let id = result.customer_create.customer.map(|c| c.id).ok_or(ShopifyApiError::MissingField("customer.id"))?;
        info!("🛍️ Created customer {id} on {}", self.shop());
        Ok(id)
    }

    /// Credits a customer's store-credit account. `account_id` may be a customer gid, in which case Shopify credits
    /// (and if necessary opens) that customer's account in `currency`.
    pub async fn credit_store_account(
        &self,
        account_id: &str,
        amount: Amount,
        currency: &str,
        expires_at: Option<&str>,
    ) -> Result<StoreCreditTransaction, ShopifyApiError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Payload {
            store_credit_account_transaction: Option<StoreCreditTransaction>,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct CreditResponse {
            store_credit_account_credit: Payload,
        }
        let mut credit_input = json!({
            "creditAmount": { "amount": amount.to_string(), "currencyCode": currency },
        });
        if let Some(expiry) = expires_at {
            credit_input["expiresAt"] = Value::String(expiry.to_string());
        }
        let vars = json!({ "id": account_id, "creditInput": credit_input });
        debug!("🛍️ Crediting {amount} {currency} to {account_id}");
        let result = self.graphql_query::<CreditResponse>(STORE_CREDIT_MUTATION, Some(vars)).await?;
        result
            .store_credit_account_credit
            .store_credit_account_transaction
            .ok_or(ShopifyApiError::MissingField("storeCreditAccountTransaction.id"))
    }

    pub async fn create_gift_card(&self, request: &GiftCardRequest) -> Result<GiftCard, ShopifyApiError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Payload {
            gift_card: Option<GiftCard>,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct GiftCardResponse {
            gift_card_create: Payload,
        }
        let vars = json!({
            "idemp": request.idempotency_key,
            "input": {
                "initialValue": request.initial_value.to_string(),
                "currency": request.currency,
                "note": request.note,
                "customerEmail": request.customer_email,
            }
        });
        debug!("🛍️ Creating {} {} gift card for {}", request.initial_value, request.currency, request.customer_email);
        let result = self.graphql_query::<GiftCardResponse>(GIFT_CARD_MUTATION, Some(vars)).await?;
        result.gift_card_create.gift_card.ok_or(ShopifyApiError::MissingField("giftCard.id"))
    }
}
