mod common;

use common::{
    AMBASSADOR_WALLET, GatewayCall, ManualClock, PLATFORM_WALLET, RecordingGateway,
    ScriptedPartner, user,
};
use donation_engine::application::donation::DonationService;
use donation_engine::application::retry_engine::IntegrationRetryEngine;
use donation_engine::config::WalletConfig;
use donation_engine::domain::money::Amount;
use donation_engine::domain::payment::{
    BillingType, Cycle, DonationKind, DonationRequest, Donor, SplitEntry,
};
use donation_engine::domain::retry::RetryConfig;
use donation_engine::domain::split::SplitPolicy;
use donation_engine::domain::wallet::WalletId;
use donation_engine::error::EngineError;
use donation_engine::infrastructure::directory::StaticAmbassadorDirectory;
use donation_engine::infrastructure::in_memory::InMemoryIntegrationStore;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;

// 2026-01-10T12:00:00Z
const NOW: u64 = 1_768_046_400_000;

fn directory() -> StaticAmbassadorDirectory {
    StaticAmbassadorDirectory::new(HashMap::from([
        ("AMB001".to_string(), WalletId::new(AMBASSADOR_WALLET)),
        ("SELF".to_string(), WalletId::new(PLATFORM_WALLET)),
        ("BROKEN".to_string(), WalletId::new("not-a-wallet")),
    ]))
}

fn service(gateway: RecordingGateway) -> DonationService {
    DonationService::new(
        Box::new(gateway),
        Box::new(directory()),
        SplitPolicy::default(),
        WalletConfig::default(),
    )
    .unwrap()
    .with_clock(Box::new(ManualClock::at(NOW)))
}

fn request(cents: u64, kind: DonationKind, ambassador: Option<&str>) -> DonationRequest {
    DonationRequest {
        amount: Amount::from_cents(cents),
        kind,
        billing_type: BillingType::Pix,
        donor: Donor {
            name: "Maria Silva".to_string(),
            email: "maria@example.com".to_string(),
            phone: Some("11987654321".to_string()),
            document: Some("52998224725".to_string()),
        },
        ambassador_code: ambassador.map(str::to_string),
        registration: None,
    }
}

fn payment_split(calls: &[GatewayCall]) -> Option<Vec<SplitEntry>> {
    calls.iter().find_map(|call| match call {
        GatewayCall::Payment(p) => Some(p.split.clone().unwrap_or_default()),
        GatewayCall::Subscription(s) => Some(s.split.clone().unwrap_or_default()),
        GatewayCall::Customer(_) => None,
    })
}

#[tokio::test]
async fn test_donation_with_ambassador_routes_commission() {
    let gateway = RecordingGateway::default();
    let receipt = service(gateway.clone())
        .process(&request(2_500, DonationKind::Donation, Some("AMB001")))
        .await
        .unwrap();

    assert_eq!(receipt.payment.id, "pay_000001");
    assert_eq!(receipt.split.institute_share, Amount::from_cents(1_750));
    assert_eq!(receipt.ambassador_wallet, Some(WalletId::new(AMBASSADOR_WALLET)));

    let calls = gateway.calls();
    assert!(matches!(&calls[0], GatewayCall::Customer(c) if c.cpf_cnpj.as_deref() == Some("52998224725")));
    let GatewayCall::Payment(payment) = &calls[1] else {
        panic!("expected a payment, got {:?}", calls[1]);
    };
    assert_eq!(payment.customer, "cus_000001");
    assert_eq!(payment.value, dec!(25.00));
    assert_eq!(payment.due_date, "2026-01-10");
    assert_eq!(payment.external_reference, format!("DONATION_{NOW}"));
    assert_eq!(
        payment_split(&calls).unwrap(),
        vec![
            SplitEntry {
                wallet_id: WalletId::new(AMBASSADOR_WALLET),
                fixed_value: dec!(5.00),
            },
            SplitEntry {
                wallet_id: WalletId::new(PLATFORM_WALLET),
                fixed_value: dec!(2.50),
            },
        ]
    );
}

#[tokio::test]
async fn test_unusable_ambassadors_fall_back_to_platform_split() {
    for code in ["NOBODY", "SELF", "BROKEN"] {
        let gateway = RecordingGateway::default();
        let receipt = service(gateway.clone())
            .process(&request(2_500, DonationKind::Donation, Some(code)))
            .await
            .unwrap();

        assert_eq!(receipt.ambassador_wallet, None, "{code}");
        assert_eq!(receipt.split.platform_share, Amount::from_cents(750), "{code}");
        assert_eq!(
            payment_split(&gateway.calls()).unwrap(),
            vec![SplitEntry {
                wallet_id: WalletId::new(PLATFORM_WALLET),
                fixed_value: dec!(7.50),
            }],
            "{code}"
        );
    }
}

#[tokio::test]
async fn test_subscription_uses_cycle() {
    let gateway = RecordingGateway::default();
    let receipt = service(gateway.clone())
        .process(&request(5_000, DonationKind::Subscription(Cycle::Yearly), None))
        .await
        .unwrap();

    assert_eq!(receipt.payment.id, "sub_000001");
    let calls = gateway.calls();
    let GatewayCall::Subscription(sub) = &calls[1] else {
        panic!("expected a subscription, got {:?}", calls[1]);
    };
    assert_eq!(sub.cycle, Cycle::Yearly);
    assert_eq!(sub.next_due_date, "2026-01-10");
    assert!(sub.description.contains("Anual"));
}

#[tokio::test]
async fn test_below_minimum_never_reaches_gateway() {
    let gateway = RecordingGateway::default();
    let err = service(gateway.clone())
        .process(&request(499, DonationKind::Donation, None))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::ValidationError(_)));
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn test_gateway_error_is_returned() {
    let gateway = RecordingGateway {
        fail_payments: true,
        ..RecordingGateway::default()
    };
    let err = service(gateway)
        .process(&request(2_500, DonationKind::Donation, None))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Gateway { status_code: Some(400), .. }));
}

#[tokio::test]
async fn test_attached_registration_is_forwarded() {
    let partner = ScriptedPartner::default();
    let engine = Arc::new(IntegrationRetryEngine::new(
        Box::new(InMemoryIntegrationStore::new()),
        Box::new(partner.clone()),
        RetryConfig::default(),
    ));
    let service = service(RecordingGateway::default()).with_registrations(Arc::clone(&engine));

    let mut donation = request(2_500, DonationKind::Donation, None);
    donation.registration = Some(user());
    let receipt = service.process(&donation).await.unwrap();

    let registration = receipt.registration.unwrap();
    assert!(registration.success);
    let log = engine.log(registration.log_id.unwrap()).await.unwrap().unwrap();
    assert_eq!(log.user_id, "cus_000001");
    assert_eq!(partner.calls(), 1);
}

#[test]
fn test_inconsistent_setup_is_rejected() {
    let policy = SplitPolicy {
        ambassador_share_ratio: dec!(0.25),
        ..SplitPolicy::default()
    };
    let result = DonationService::new(
        Box::new(RecordingGateway::default()),
        Box::new(directory()),
        policy,
        WalletConfig::default(),
    );
    assert!(result.is_err());

    let wallets = WalletConfig {
        platform: WalletId::new("platform"),
        reserved: Vec::new(),
    };
    let result = DonationService::new(
        Box::new(RecordingGateway::default()),
        Box::new(directory()),
        SplitPolicy::default(),
        wallets,
    );
    assert!(result.is_err());
}
