//! Invoice lifecycle example: create, pay, and inspect a GST sales invoice

use bigdecimal::BigDecimal;
use chrono::Utc;
use invoicing_core::{
    utils::MemoryStore, DocumentInput, DocumentType, EngineOptions, InvoiceEngine, LineItemInput,
    NewParty, PartyDirectory, PaymentMethod, PaymentRequest, PaymentSetup, TaxMode,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🧾 Invoicing Core - Invoice Lifecycle Example\n");

    let store = MemoryStore::new();
    let company = Uuid::new_v4();

    let customer = store
        .create_party(NewParty {
            company_id: company,
            name: "Sharma Electronics".to_string(),
            identity_key: None,
            phone: Some("9876543210".to_string()),
            email: None,
        })
        .await?;

    let engine = InvoiceEngine::new(store, EngineOptions::default());

    // 1. Create a GST invoice with mixed tax modes
    println!("📄 Creating invoice:");
    let mut discounted = LineItemInput::new(
        "LED Bulb 9W".to_string(),
        BigDecimal::from(20),
        BigDecimal::from(85),
        BigDecimal::from(18),
        TaxMode::Inclusive,
    );
    discounted.discount_percent = BigDecimal::from(5);

    let input = DocumentInput {
        document_type: DocumentType::Sale,
        date: Utc::now().date_naive(),
        company_id: company,
        party_id: customer.id,
        items: vec![
            LineItemInput::new(
                "Ceiling Fan".to_string(),
                BigDecimal::from(2),
                BigDecimal::from(1500),
                BigDecimal::from(18),
                TaxMode::Exclusive,
            ),
            discounted,
        ],
        round_off: None,
        payment: PaymentSetup {
            method: PaymentMethod::Credit,
            paid_amount: BigDecimal::from(0),
            credit_days: 15,
            due_date: None,
        },
    };

    let outcome = engine.create_document(input, "demo-user").await?;
    let invoice = outcome.document;

    println!("  Number:      {}", invoice.number);
    for item in &invoice.items {
        println!(
            "    {} x {} @ ₹{} = ₹{} (CGST ₹{} + SGST ₹{})",
            item.quantity,
            item.name,
            item.price_per_unit,
            item.line_total,
            item.cgst_amount,
            item.sgst_amount
        );
    }
    println!("  Subtotal:    ₹{}", invoice.totals.subtotal);
    println!("  Discount:    ₹{}", invoice.totals.total_discount);
    println!("  Total tax:   ₹{}", invoice.totals.total_tax);
    println!("  Final total: ₹{}", invoice.totals.final_total);
    println!("  Status:      {}", invoice.payment.status.as_str());
    println!("  Due date:    {:?}\n", invoice.payment.due_date);

    // 2. Record a partial payment
    println!("💰 Recording partial payment of ₹2000:");
    let invoice = engine
        .add_payment(
            invoice.id,
            &PaymentRequest {
                amount: BigDecimal::from(2000),
                method: PaymentMethod::Upi,
                reference: Some("UPI-84721".to_string()),
                payment_date: Utc::now().date_naive(),
                due_date: None,
                credit_days: None,
            },
            "demo-user",
        )
        .await?;
    println!("  Paid:    ₹{}", invoice.payment.paid_amount);
    println!("  Pending: ₹{}", invoice.payment.pending_amount);
    println!("  Status:  {}\n", invoice.payment.status.as_str());

    // 3. Settle the balance
    println!("💰 Settling the balance:");
    let balance = invoice.payment.pending_amount.clone();
    let invoice = engine
        .add_payment(
            invoice.id,
            &PaymentRequest {
                amount: balance,
                method: PaymentMethod::Cash,
                reference: None,
                payment_date: Utc::now().date_naive(),
                due_date: None,
                credit_days: None,
            },
            "demo-user",
        )
        .await?;
    println!("  Status:   {}", invoice.payment.status.as_str());
    println!("  Due date: {:?} (cleared on settlement)", invoice.payment.due_date);
    println!("  History entries: {}\n", invoice.payment_history.len());

    println!("🎉 Invoice lifecycle example completed successfully!");
    Ok(())
}
