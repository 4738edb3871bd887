//! Conversion example: sales order to invoice, then invoice to the
//! buyer's purchase invoice

use bigdecimal::BigDecimal;
use chrono::Utc;
use invoicing_core::{
    utils::MemoryStore, DocumentInput, DocumentType, EngineOptions, InvoiceEngine, LineItemInput,
    NewParty, PartyDirectory, PaymentSetup, SupplierProfile, TaxMode,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔄 Invoicing Core - Document Conversion Example\n");

    let store = MemoryStore::new();
    let seller_company = Uuid::new_v4();
    let buyer_company = Uuid::new_v4();

    let customer = store
        .create_party(NewParty {
            company_id: seller_company,
            name: "Gupta Traders".to_string(),
            identity_key: None,
            phone: Some("9812345678".to_string()),
            email: None,
        })
        .await?;

    let engine = InvoiceEngine::new(store.clone(), EngineOptions::default());

    // 1. A sales order with an advance payment
    println!("📋 Creating sales order with ₹500 advance:");
    let order = engine
        .create_document(
            DocumentInput {
                document_type: DocumentType::SalesOrder,
                date: Utc::now().date_naive(),
                company_id: seller_company,
                party_id: customer.id,
                items: vec![LineItemInput::new(
                    "Copper Wire 10m".to_string(),
                    BigDecimal::from(10),
                    BigDecimal::from(100),
                    BigDecimal::from(18),
                    TaxMode::Exclusive,
                )],
                round_off: None,
                payment: PaymentSetup {
                    paid_amount: BigDecimal::from(500),
                    ..PaymentSetup::default()
                },
            },
            "demo-user",
        )
        .await?
        .document;
    println!("  Number: {}", order.number);
    println!("  Total:  ₹{}", order.totals.final_total);
    println!("  Paid:   ₹{}\n", order.payment.paid_amount);

    // 2. Convert the order into a sales invoice
    println!("➡️  Converting order to invoice:");
    let outcome = engine.convert_order_to_invoice(order.id, "demo-user").await?;
    let invoice = engine.get_document_required(outcome.target_id).await?;
    println!("  Number:  {}", invoice.number);
    println!("  Paid:    ₹{} (advance carried over)", invoice.payment.paid_amount);
    println!("  Pending: ₹{}", invoice.payment.pending_amount);
    println!("  Status:  {}\n", invoice.payment.status.as_str());

    // Converting again returns the same invoice instead of a duplicate
    let again = engine.convert_order_to_invoice(order.id, "demo-user").await?;
    println!(
        "  Converting again: created={}, same target={}\n",
        again.created,
        again.target_id == invoice.id
    );

    // 3. Convert the invoice into the buyer's purchase invoice
    println!("➡️  Converting invoice to cross-company purchase invoice:");
    let outcome = engine
        .convert_to_purchase_invoice(
            invoice.id,
            buyer_company,
            &SupplierProfile {
                name: "Seller & Co".to_string(),
                phone: Some("9800011122".to_string()),
                email: None,
            },
            "demo-user",
        )
        .await?;
    let purchase = engine.get_document_required(outcome.target_id).await?;
    println!("  Number:  {}", purchase.number);
    println!("  Company: {} (buyer's books)", purchase.company_id);
    println!("  Total:   ₹{} (amounts carried verbatim)", purchase.totals.final_total);

    let supplier = store
        .find_party(buyer_company, &seller_company.to_string())
        .await?
        .expect("supplier party created during conversion");
    println!("  Supplier party: {} ({})\n", supplier.name, supplier.id);

    println!("🎉 Conversion example completed successfully!");
    Ok(())
}
