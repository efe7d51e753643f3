//! Sample supply-chain domain (`SCMAPI`)
//!
//! An in-memory stand-in for the order/inventory backend, seeded with a small
//! fixed dataset. Every session gets its own store; nothing is persisted.

use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

use crate::registry::capability::{optional_str, required_i64, required_str};
use crate::registry::{
    Arguments, Capability, CapabilityGroup, CapabilityModule, CapabilitySpec, ParamKind,
};

pub const MODULE_NAME: &str = "SCMAPI";

/* ===================== Store ===================== */

#[derive(Debug, Clone, Serialize)]
struct Customer {
    #[serde(skip)]
    customer_id: String,
    name: String,
    address: String,
    contact_info: String,
}

#[derive(Debug, Clone, Serialize)]
struct Product {
    product_id: String,
    name: String,
    price: f64,
}

#[derive(Debug, Clone)]
struct Order {
    order_id: String,
    customer_id: String,
    order_date: String,
    status: String,
}

#[derive(Debug, Clone, Serialize)]
struct OrderLine {
    #[serde(skip)]
    order_id: String,
    product_id: String,
    quantity: i64,
    allocated_quantity: i64,
    remaining_quantity: i64,
}

#[derive(Debug, Clone)]
struct StockLevel {
    product_id: String,
    stock_quantity: i64,
    reserved_quantity: i64,
}

impl StockLevel {
    fn available(&self) -> i64 {
        (self.stock_quantity - self.reserved_quantity).max(0)
    }
}

#[derive(Debug, Serialize)]
struct OrderSummary<'a> {
    order_id: &'a str,
    order_date: &'a str,
    status: &'a str,
}

#[derive(Debug, Serialize)]
struct Allocation {
    product_id: String,
    newly_allocated_quantity: i64,
    remaining_quantity: i64,
}

#[derive(Debug, Clone)]
pub struct ScmStore {
    customers: Vec<Customer>,
    products: Vec<Product>,
    orders: Vec<Order>,
    lines: Vec<OrderLine>,
    stock: Vec<StockLevel>,
}

impl ScmStore {
    /// Fixed seed dataset
    pub fn seeded() -> Self {
        let customer = |id: &str, name: &str, address: &str, contact: &str| Customer {
            customer_id: id.to_string(),
            name: name.to_string(),
            address: address.to_string(),
            contact_info: contact.to_string(),
        };
        let product = |id: &str, name: &str, price: f64| Product {
            product_id: id.to_string(),
            name: name.to_string(),
            price,
        };
        let order = |id: &str, customer: &str, date: &str, status: &str| Order {
            order_id: id.to_string(),
            customer_id: customer.to_string(),
            order_date: date.to_string(),
            status: status.to_string(),
        };
        let line = |order: &str, product: &str, quantity: i64, allocated: i64| OrderLine {
            order_id: order.to_string(),
            product_id: product.to_string(),
            quantity,
            allocated_quantity: allocated,
            remaining_quantity: quantity - allocated,
        };
        let stock = |product: &str, quantity: i64, reserved: i64| StockLevel {
            product_id: product.to_string(),
            stock_quantity: quantity,
            reserved_quantity: reserved,
        };

        Self {
            customers: vec![
                customer("C001", "Acme Manufacturing", "12 Foundry Road, Springfield", "orders@acme.example"),
                customer("C002", "Globex Retail", "400 Market Street, Shelbyville", "buying@globex.example"),
                customer("C003", "Initech Supplies", "9 Office Park, Capital City", "procurement@initech.example"),
            ],
            products: vec![
                product("P001", "Steel Bracket", 4.5),
                product("P002", "Hydraulic Pump", 129.0),
                product("P003", "Control Board", 62.75),
            ],
            orders: vec![
                order("O001", "C001", "2025-01-01", "Pending"),
                order("O002", "C002", "2025-01-02", "Shipped"),
                order("O003", "C002", "2025-01-03", "Pending"),
            ],
            lines: vec![
                line("O001", "P001", 10, 0),
                line("O001", "P002", 5, 0),
                line("O002", "P001", 20, 20),
                line("O003", "P003", 100, 0),
            ],
            stock: vec![
                stock("P001", 120, 20),
                stock("P002", 3, 0),
                stock("P003", 1, 0),
            ],
        }
    }

    fn order_mut(&mut self, order_id: &str) -> Option<&mut Order> {
        self.orders.iter_mut().find(|o| o.order_id == order_id)
    }

    fn stock_mut(&mut self, product_id: &str) -> Option<&mut StockLevel> {
        self.stock.iter_mut().find(|s| s.product_id == product_id)
    }

    fn get_customer_details(&self, customer_id: &str) -> Result<JsonValue> {
        match self.customers.iter().find(|c| c.customer_id == customer_id) {
            Some(customer) => Ok(serde_json::to_value(customer)?),
            None => Ok(json!({})),
        }
    }

    fn get_products(&self) -> Result<JsonValue> {
        Ok(serde_json::to_value(&self.products)?)
    }

    fn get_pending_orders(&self, customer_id: Option<&str>) -> Result<JsonValue> {
        let pending: Vec<OrderSummary> = self
            .orders
            .iter()
            .filter(|o| o.status == "Pending")
            .filter(|o| customer_id.map_or(true, |id| o.customer_id == id))
            .map(|o| OrderSummary {
                order_id: &o.order_id,
                order_date: &o.order_date,
                status: &o.status,
            })
            .collect();
        Ok(serde_json::to_value(pending)?)
    }

    fn get_order_status(&self, order_id: &str) -> JsonValue {
        self.orders
            .iter()
            .find(|o| o.order_id == order_id)
            .map(|o| JsonValue::String(o.status.clone()))
            .unwrap_or_else(|| JsonValue::String("Order not found".to_string()))
    }

    fn update_order_status(&mut self, order_id: &str, status: &str) -> JsonValue {
        match self.order_mut(order_id) {
            Some(order) => {
                order.status = status.to_string();
                JsonValue::Bool(true)
            }
            None => JsonValue::Bool(false),
        }
    }

    fn get_order_details(&self, order_id: &str) -> Result<JsonValue> {
        let lines: Vec<&OrderLine> = self.lines.iter().filter(|l| l.order_id == order_id).collect();
        Ok(serde_json::to_value(lines)?)
    }

    fn check_stock(&self, product_id: &str) -> JsonValue {
        let quantity = self
            .stock
            .iter()
            .find(|s| s.product_id == product_id)
            .map_or(0, |s| s.stock_quantity);
        json!(quantity)
    }

    /// Reserve what is available for each open line of an order
    fn allocate_stock(&mut self, order_id: &str) -> Result<JsonValue> {
        let mut allocations = Vec::new();

        let line_indices: Vec<usize> = self
            .lines
            .iter()
            .enumerate()
            .filter(|(_, l)| l.order_id == order_id)
            .map(|(i, _)| i)
            .collect();

        for index in line_indices {
            let product_id = self.lines[index].product_id.clone();
            let remaining = self.lines[index].remaining_quantity;
            let available = self
                .stock
                .iter()
                .find(|s| s.product_id == product_id)
                .map_or(0, StockLevel::available);
            let allocated = remaining.min(available).max(0);

            if let Some(level) = self.stock_mut(&product_id) {
                level.reserved_quantity += allocated;
            }
            let line = &mut self.lines[index];
            line.allocated_quantity += allocated;
            line.remaining_quantity -= allocated;

            allocations.push(Allocation {
                product_id,
                newly_allocated_quantity: allocated,
                remaining_quantity: line.remaining_quantity,
            });
        }

        if !allocations.is_empty() {
            let status = if allocations.iter().all(|a| a.remaining_quantity == 0) {
                "Allocated"
            } else {
                "Partially Allocated"
            };
            if let Some(order) = self.order_mut(order_id) {
                order.status = status.to_string();
            }
        }

        debug!(order_id = %order_id, lines = allocations.len(), "Stock allocated");
        Ok(serde_json::to_value(allocations)?)
    }

    fn adjust_stock(&mut self, product_id: &str, quantity_delta: i64) -> Result<JsonValue> {
        match self.stock_mut(product_id) {
            Some(level) => {
                level.stock_quantity = level
                    .stock_quantity
                    .checked_add(quantity_delta)
                    .ok_or_else(|| anyhow::anyhow!("stock quantity overflow for {}", product_id))?;
                Ok(JsonValue::Bool(true))
            }
            None => Ok(JsonValue::Bool(false)),
        }
    }
}

/* ===================== Module ===================== */

type Shared = Rc<RefCell<ScmStore>>;

pub fn module() -> CapabilityModule {
    module_with_store(ScmStore::seeded())
}

pub fn module_with_store(store: ScmStore) -> CapabilityModule {
    let store: Shared = Rc::new(RefCell::new(store));

    CapabilityModule::new(MODULE_NAME)
        .with_group(product_group(&store))
        .with_group(customer_group(&store))
        .with_group(customer_order_group(&store))
        .with_group(inventory_group(&store))
}

/// Read-only capability over the shared store
fn reader<F>(store: &Shared, spec: CapabilitySpec, f: F) -> Capability
where
    F: Fn(&ScmStore, &Arguments) -> Result<JsonValue> + 'static,
{
    let store = Rc::clone(store);
    Capability::new(spec, move |args| f(&store.borrow(), &args))
}

/// Mutating capability over the shared store
fn writer<F>(store: &Shared, spec: CapabilitySpec, f: F) -> Capability
where
    F: Fn(&mut ScmStore, &Arguments) -> Result<JsonValue> + 'static,
{
    let store = Rc::clone(store);
    Capability::new(spec, move |args| f(&mut store.borrow_mut(), &args))
}

fn example(name: &str, function: &str, arguments: JsonValue, output_var: &str) -> JsonValue {
    json!({
        "name": name,
        "function": function,
        "arguments": arguments,
        "output_var": output_var
    })
}

fn product_group(store: &Shared) -> CapabilityGroup {
    CapabilityGroup::new("product").with(reader(
        store,
        CapabilitySpec::new("get_products", "List all products with price").example(example(
            "Get Products",
            "product.get_products",
            json!({}),
            "products",
        )),
        |s, _| s.get_products(),
    ))
}

fn customer_group(store: &Shared) -> CapabilityGroup {
    CapabilityGroup::new("customer").with(reader(
        store,
        CapabilitySpec::new(
            "get_customer_details",
            "Name, address, and contact information of a customer",
        )
        .required("customer_id", ParamKind::String)
        .example(example(
            "Get Customer Details",
            "customer.get_customer_details",
            json!({"customer_id": "C001"}),
            "customer_details",
        )),
        |s, args| s.get_customer_details(required_str(args, "customer_id")?),
    ))
}

fn customer_order_group(store: &Shared) -> CapabilityGroup {
    CapabilityGroup::new("customer_order")
        .with(reader(
            store,
            CapabilitySpec::new(
                "get_pending_orders",
                "Pending orders, optionally for one customer",
            )
            .optional("customer_id", ParamKind::String)
            .example(example(
                "Get Pending Orders",
                "customer_order.get_pending_orders",
                json!({"customer_id": "C001"}),
                "pending_orders",
            )),
            |s, args| s.get_pending_orders(optional_str(args, "customer_id")),
        ))
        .with(reader(
            store,
            CapabilitySpec::new("get_order_status", "Current status of an order")
                .required("order_id", ParamKind::String)
                .example(example(
                    "Get Order Status",
                    "customer_order.get_order_status",
                    json!({"order_id": "O001"}),
                    "order_status",
                )),
            |s, args| Ok(s.get_order_status(required_str(args, "order_id")?)),
        ))
        .with(writer(
            store,
            CapabilitySpec::new("update_order_status", "Set the status of an order")
                .required("order_id", ParamKind::String)
                .required("status", ParamKind::String)
                .example(example(
                    "Update Order Status",
                    "customer_order.update_order_status",
                    json!({"order_id": "O001", "status": "Shipped"}),
                    "update_success",
                )),
            |s, args| {
                Ok(s.update_order_status(
                    required_str(args, "order_id")?,
                    required_str(args, "status")?,
                ))
            },
        ))
        .with(reader(
            store,
            CapabilitySpec::new(
                "get_order_details",
                "Order lines with requested, allocated, and remaining quantities",
            )
            .required("order_id", ParamKind::String)
            .example(example(
                "Get Order Details",
                "customer_order.get_order_details",
                json!({"order_id": "O001"}),
                "order_details",
            )),
            |s, args| s.get_order_details(required_str(args, "order_id")?),
        ))
}

fn inventory_group(store: &Shared) -> CapabilityGroup {
    CapabilityGroup::new("inventory")
        .with(reader(
            store,
            CapabilitySpec::new("check_stock", "Stock level of a product")
                .required("product_id", ParamKind::String)
                .example(example(
                    "Check Stock",
                    "inventory.check_stock",
                    json!({"product_id": "P001"}),
                    "stock_level",
                )),
            |s, args| Ok(s.check_stock(required_str(args, "product_id")?)),
        ))
        .with(writer(
            store,
            CapabilitySpec::new("allocate_stock", "Reserve available stock for an order")
                .required("order_id", ParamKind::String)
                .example(example(
                    "Allocate Stock",
                    "inventory.allocate_stock",
                    json!({"order_id": "O001"}),
                    "allocation_result",
                )),
            |s, args| s.allocate_stock(required_str(args, "order_id")?),
        ))
        .with(writer(
            store,
            CapabilitySpec::new("adjust_stock", "Add to or subtract from a product's stock")
                .required("product_id", ParamKind::String)
                .required("quantity_delta", ParamKind::Integer)
                .example(example(
                    "Adjust Stock",
                    "inventory.adjust_stock",
                    json!({"product_id": "P001", "quantity_delta": -10}),
                    "adjustment_success",
                )),
            |s, args| {
                s.adjust_stock(
                    required_str(args, "product_id")?,
                    required_i64(args, "quantity_delta")?,
                )
            },
        ))
}
