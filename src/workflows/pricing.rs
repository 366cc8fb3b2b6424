// Fees for finished jobs, expressed in integer cents

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::requests::{CartLineItem, FabricationRequest, PcbSiding, ProjectDetails};

/// Shop price list used when a finished job is added to a cart
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PricingPolicy {
    /// Per printed part
    pub print3d_unit_cents: u64,
    /// Per started square inch of single-sided board
    pub pcb_single_sided_cents_per_sq_in: u64,
    /// Per started square inch of double-sided board
    pub pcb_double_sided_cents_per_sq_in: u64,
    /// Per cut piece
    pub laser_unit_cents: u64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            print3d_unit_cents: 500,
            pcb_single_sided_cents_per_sq_in: 150,
            pcb_double_sided_cents_per_sq_in: 250,
            laser_unit_cents: 1000,
        }
    }
}

impl PricingPolicy {
    pub fn line_item(&self, request: &FabricationRequest, now: DateTime<Utc>) -> CartLineItem {
        let (description, quantity, unit_price_cents) = match &request.details {
            ProjectDetails::Print3d {
                quantity,
                filament_color,
            } => (
                format!("3D print ({quantity} x {filament_color})"),
                *quantity,
                self.print3d_unit_cents,
            ),
            ProjectDetails::Pcb {
                siding,
                silkscreen,
                rubout,
                board_area_sq_in,
            } => {
                let area = board_area_sq_in.ceil().max(1.0) as u64;
                let (sides, rate) = match siding {
                    PcbSiding::Single => ("single-sided", self.pcb_single_sided_cents_per_sq_in),
                    PcbSiding::Double => ("double-sided", self.pcb_double_sided_cents_per_sq_in),
                };
                let mut extras = String::new();
                if *silkscreen {
                    extras.push_str(", silkscreen");
                }
                if *rubout {
                    extras.push_str(", rubout");
                }
                (
                    format!("PCB mill ({sides}, {area} sq in{extras})"),
                    1,
                    rate.saturating_mul(area),
                )
            }
            ProjectDetails::Laser { material, quantity } => (
                format!("Laser cut ({quantity} x {material})"),
                *quantity,
                self.laser_unit_cents,
            ),
        };

        CartLineItem {
            request_id: request.id,
            customer_email: request.customer_email.clone(),
            description,
            quantity,
            unit_price_cents,
            total_cents: unit_price_cents.saturating_mul(u64::from(quantity)),
            created_at: now,
        }
    }
}
