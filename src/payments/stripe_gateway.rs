use std::collections::HashMap;

use async_trait::async_trait;
use stripe::{
    Client, CreateCustomer, CreatePaymentIntent, CreatePaymentIntentAutomaticPaymentMethods,
    Customer, ListCustomers, PaymentIntent, PaymentIntentId, RequestStrategy,
};
use tracing::{error, info};

use super::{
    CreatedPaymentIntent, CustomerProfile, GatewayError, NewPaymentIntent, PaymentGateway,
    PaymentIntentSummary, PaymentStatus,
};

/// [`PaymentGateway`] backed by the Stripe API.
#[derive(Clone)]
pub struct StripeGateway {
    client: Client,
}

impl StripeGateway {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(secret_key.into()),
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[tracing::instrument(skip(self))]
    async fn create_payment_intent(
        &self,
        request: NewPaymentIntent,
    ) -> Result<CreatedPaymentIntent, GatewayError> {
        let client = match &request.idempotency_key {
            Some(key) => self
                .client
                .clone()
                .with_strategy(RequestStrategy::Idempotent(key.clone())),
            None => self.client.clone(),
        };

        let mut create_intent = CreatePaymentIntent::new(request.amount, request.currency);
        create_intent.automatic_payment_methods = Some(CreatePaymentIntentAutomaticPaymentMethods {
            allow_redirects: None,
            enabled: true,
        });
        create_intent.metadata = Some(HashMap::from([
            ("booking_id".to_string(), request.booking_id.clone()),
            ("customer_email".to_string(), request.customer_email.clone()),
        ]));

        let payment_intent = PaymentIntent::create(&client, create_intent)
            .await
            .map_err(|e| {
                error!("Error creating payment intent: {e:?}");
                GatewayError::Provider(e.to_string())
            })?;
        info!("Created PaymentIntent with id: {}", payment_intent.id);

        let id = payment_intent.id.to_string();
        let client_secret = payment_intent
            .client_secret
            .ok_or_else(|| GatewayError::MissingClientSecret(id.clone()))?;
        Ok(CreatedPaymentIntent { id, client_secret })
    }

    #[tracing::instrument(skip(self))]
    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<PaymentIntentSummary, GatewayError> {
        let id = payment_intent_id
            .parse::<PaymentIntentId>()
            .map_err(|_| GatewayError::InvalidId(payment_intent_id.to_string()))?;

        let payment_intent = PaymentIntent::retrieve(&self.client, &id, &[])
            .await
            .map_err(|e| {
                error!("Error retrieving payment intent {payment_intent_id}: {e:?}");
                GatewayError::Provider(e.to_string())
            })?;

        Ok(PaymentIntentSummary {
            id: payment_intent.id.to_string(),
            status: PaymentStatus::from(payment_intent.status),
            amount: payment_intent.amount,
            currency: payment_intent.currency.to_string(),
            customer_id: payment_intent.customer.map(|c| c.id().to_string()),
        })
    }

    #[tracing::instrument(skip(self, profile))]
    async fn ensure_customer(&self, profile: &CustomerProfile) -> Result<String, GatewayError> {
        let mut params = ListCustomers::new();
        params.email = Some(&profile.email);
        params.limit = Some(1);

        let existing = Customer::list(&self.client, &params).await.map_err(|e| {
            error!("Error listing customers: {e:?}");
            GatewayError::Provider(e.to_string())
        })?;
        if let Some(customer) = existing.data.into_iter().next() {
            info!("Reusing customer with id: {}", customer.id);
            return Ok(customer.id.to_string());
        }

        let customer = Customer::create(
            &self.client,
            CreateCustomer {
                email: Some(&profile.email),
                name: profile.name.as_deref(),
                phone: profile.phone.as_deref(),
                metadata: Some(HashMap::from([(
                    "source".to_string(),
                    "storefront".to_string(),
                )])),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| {
            error!("Error creating customer: {e:?}");
            GatewayError::Provider(e.to_string())
        })?;
        info!("Created customer with id: {}", customer.id);
        Ok(customer.id.to_string())
    }
}
