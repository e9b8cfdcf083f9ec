//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "PV design and financial calculation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Grid-tied PV array sizing: capacity reconciliation, module count, inverter choice,
//! production estimate, and the installation bill of materials.

use once_cell::sync::Lazy;

use crate::{
    cable::{CircuitDuty, DesignCurrentPolicy},
    calculator::Calculator,
    errors::Result,
    model::{row, InputBag, InverterModel, OutputRow, PanelModel},
    optimizer::{select_inverter, SelectionConstraints, DEFAULT_INVERTER_CATALOG},
    result::{fixed, ResultBuilder},
    schema::{Category, CalculatorConfig, Formula, InputField, StandardValue},
    sizing::{
        annual_production, capacity_factor_percent, consumption_based_capacity, default_azimuth,
        default_tilt, module_count, realized_capacity, reconcile_capacity, required_area,
        space_based_capacity, specific_yield, ShadingCondition, DEFAULT_GROUND_COVERAGE_RATIO,
        DEFAULT_MODULE_AREA_M2, DEFAULT_MODULE_WATTAGE_W, SHADING_NAMES,
    },
    validation::ValidationRule,
};

pub const DEFAULT_DAILY_YIELD: f64 = 5.0;
pub const MODULES_PER_STRING: u32 = 18;
const COMBINER_INPUTS: u32 = 8;
const DEFAULT_AC_VOLTAGE: f64 = 400.0;

const INSTALLATION_TYPES: [&str; 5] = [
    "Open Rack (Ground Mounted)",
    "Fixed - Roof Mounted",
    "1-Axis Tracker",
    "1-Axis Backtracking",
    "2-Axis Tracker",
];

fn has_location(bag: &InputBag) -> bool {
    let coordinates = bag.number("latitude").is_some() && bag.number("longitude").is_some();
    let place = bag.text("city").is_some() && bag.text("country").is_some();
    coordinates || place
}

fn ratio_bounds_ordered(bag: &InputBag) -> bool {
    bag.number_or("dc_ac_ratio_min", 0.9) <= bag.number_or("dc_ac_ratio_max", 1.25)
}

static CONFIG: Lazy<CalculatorConfig> = Lazy::new(|| CalculatorConfig {
    id: "pv_sizing",
    name: "PV System Sizing",
    description: "Size a grid-connected PV array from daytime consumption and available space, then select inverters",
    category: Category::Sizing,
    inputs: vec![
        InputField::number("daily_consumption_kwh", "Daily Daytime Consumption")
            .unit("kWh")
            .required()
            .at_least(0.0)
            .describe("Average energy used between 06:00 and 18:00"),
        InputField::number("daily_solar_yield", "Daily Solar Yield")
            .unit("kWh/kWp/day")
            .default_number(DEFAULT_DAILY_YIELD)
            .describe("Specific yield from the solar resource provider"),
        InputField::number("latitude", "Latitude").unit("°").bounds(-90.0, 90.0),
        InputField::number("longitude", "Longitude").unit("°").bounds(-180.0, 180.0),
        InputField::text("city", "City"),
        InputField::text("country", "Country"),
        InputField::number("available_area_m2", "Available Area")
            .unit("m²")
            .required()
            .at_least(10.0),
        InputField::choice("shading", "Shading Condition", SHADING_NAMES)
            .default_text("shade_free"),
        InputField::number("installation_type", "Installation Type")
            .default_number(1.0)
            .bounds(0.0, 4.0)
            .describe("0 open rack, 1 roof, 2 one-axis, 3 one-axis backtracking, 4 two-axis"),
        InputField::number("module_wattage_w", "Module Wattage")
            .unit("Wp")
            .default_number(DEFAULT_MODULE_WATTAGE_W),
        InputField::number("module_area_m2", "Module Area")
            .unit("m²")
            .default_number(DEFAULT_MODULE_AREA_M2),
        InputField::number("module_length_mm", "Module Length").unit("mm"),
        InputField::number("module_width_mm", "Module Width").unit("mm"),
        InputField::text("panel_manufacturer", "Panel Manufacturer"),
        InputField::text("panel_model", "Panel Model"),
        InputField::text("inverter_manufacturer", "Inverter Manufacturer"),
        InputField::number("ground_coverage_ratio", "Ground Coverage Ratio")
            .default_number(DEFAULT_GROUND_COVERAGE_RATIO)
            .bounds(0.05, 1.0),
        InputField::number("performance_ratio_percent", "Performance Ratio")
            .unit("%")
            .default_number(80.0)
            .bounds(1.0, 100.0),
        InputField::choice("system_ac_voltage", "System AC Voltage", &["380", "400", "415", "480"])
            .unit("V")
            .default_number(DEFAULT_AC_VOLTAGE),
        InputField::number("tilt_deg", "Tilt").unit("°").bounds(0.0, 90.0),
        InputField::number("azimuth_deg", "Azimuth").unit("°").bounds(0.0, 360.0),
        InputField::sequence("inverter_catalog_kw", "Inverter Catalogue")
            .unit("kW")
            .describe("Unit AC capacities to choose from; replaces the built-in catalogue"),
        InputField::number("dc_ac_ratio_min", "Minimum DC/AC Ratio").default_number(0.9),
        InputField::number("dc_ac_ratio_max", "Maximum DC/AC Ratio").default_number(1.25),
        InputField::number("dc_ac_ratio_preferred", "Preferred DC/AC Ratio").default_number(1.0),
    ],
    rules: vec![
        ValidationRule::required("daily_consumption_kwh", "Daily daytime energy consumption is required"),
        ValidationRule::positive("daily_consumption_kwh", "Consumption must be a positive number"),
        ValidationRule::custom("location", has_location, "Either coordinates (lat/long) or city/country is required"),
        ValidationRule::range("latitude", -90.0, 90.0, "Latitude must be between -90 and 90"),
        ValidationRule::range("longitude", -180.0, 180.0, "Longitude must be between -180 and 180"),
        ValidationRule::required("available_area_m2", "Available installation space is required"),
        ValidationRule::min("available_area_m2", 10.0, "Minimum 10 m² required for installation"),
        ValidationRule::positive("daily_solar_yield", "Daily solar yield must be positive"),
        ValidationRule::range("installation_type", 0.0, 4.0, "Installation type must be 0-4"),
        ValidationRule::positive("module_wattage_w", "Module wattage must be positive"),
        ValidationRule::positive("module_area_m2", "Module area must be positive"),
        ValidationRule::range("ground_coverage_ratio", 0.05, 1.0, "Ground coverage ratio must be 0.05-1.0"),
        ValidationRule::range("performance_ratio_percent", 1.0, 100.0, "Performance ratio must be 1-100%"),
        ValidationRule::positive("system_ac_voltage", "System AC voltage must be positive"),
        ValidationRule::positive("dc_ac_ratio_min", "DC/AC ratio bounds must be positive"),
        ValidationRule::custom("dc_ac_ratio_max", ratio_bounds_ordered, "Minimum DC/AC ratio must not exceed the maximum"),
        ValidationRule::one_of("shading", SHADING_NAMES, "Shading must be partial or shade_free"),
    ],
    formulas: vec![
        Formula {
            name: "PV Capacity (Consumption-Based)",
            expression: "PV_wp1 = E_cons / (E_sol × PR)",
            description: "Capacity needed to cover daytime consumption",
            variables: &[("E_cons", "Daily daytime consumption (kWh)"), ("E_sol", "Daily specific yield (kWh/kWp)"), ("PR", "Performance ratio")],
        },
        Formula {
            name: "PV Capacity (Space-Based)",
            expression: "PV_wp2 = (S_t × GCR / S_p) × P_module",
            description: "Maximum capacity that fits on the available area",
            variables: &[("S_t", "Available area (m²)"), ("GCR", "Ground coverage ratio"), ("S_p", "Module area (m²)"), ("P_module", "Module rating (kWp)")],
        },
        Formula {
            name: "Final PV Capacity",
            expression: "PV_wp = MIN(PV_wp1, PV_wp2)",
            description: "The binding estimate wins",
            variables: &[],
        },
        Formula {
            name: "DC/AC Ratio",
            expression: "Ratio = PV_wp / (P_inv × N_inv)",
            description: "Kept within 0.9-1.25, preferring at least 1.0 with the fewest units",
            variables: &[("P_inv", "Inverter AC rating (kW)"), ("N_inv", "Inverter quantity")],
        },
        Formula {
            name: "Tilt Angle",
            expression: "β = |φ| − 2° if |φ| ≤ 25°, else 25°",
            description: "Default tilt from latitude",
            variables: &[("φ", "Latitude")],
        },
        Formula {
            name: "Annual Production",
            expression: "E = PV_wp × E_sol × 365 × PR × (1 − L_sys)",
            description: "First-year AC energy",
            variables: &[("L_sys", "System losses")],
        },
    ],
    standards: vec![
        StandardValue::number("Performance Ratio", 80.0, "%", "IEC 61724"),
        StandardValue::number("Ground Coverage Ratio", 0.45, "", "Industry Practice"),
        StandardValue::number("DC/AC Ratio Minimum", 0.9, "", "Design Practice"),
        StandardValue::number("DC/AC Ratio Maximum", 1.25, "", "Design Practice"),
        StandardValue::number("System Loss (Partial Shading)", 14.5, "%", "PVWatts"),
        StandardValue::number("System Loss (Shade Free)", 12.0, "%", "PVWatts"),
    ],
});

#[derive(Debug, Clone, Copy, Default)]
pub struct PvSizing;

struct MaterialsContext<'a> {
    panel: &'a PanelModel,
    module_count: u32,
    inverter: &'a InverterModel,
    inverter_quantity: u32,
    installation: &'static str,
    capacity_kwp: f64,
    ac_voltage: f64,
}

fn installation_items(ctx: &MaterialsContext<'_>) -> Vec<OutputRow> {
    let strings = ctx.module_count.div_ceil(MODULES_PER_STRING);
    let ac_current = (ctx.capacity_kwp * 1000.0 / (ctx.ac_voltage * 3f64.sqrt())).ceil();
    let acdb_rating = DesignCurrentPolicy::default()
        .design_current(CircuitDuty::ContinuousAc, ac_current, None)
        .ceil();
    let large = ctx.capacity_kwp > 50.0;
    let panel_spec = format!(
        "{} {} {}Wp",
        ctx.panel.manufacturer, ctx.panel.model, ctx.panel.rated_power_w
    );
    let inverter_spec = format!(
        "{} {} {}kW",
        ctx.inverter.manufacturer, ctx.inverter.model, ctx.inverter.ac_capacity_kw
    );

    let items: [(&str, String, f64, &str); 12] = [
        ("Solar PV Modules", panel_spec.trim().to_owned(), f64::from(ctx.module_count), "pcs"),
        ("Grid-Tie Inverter", inverter_spec.trim().to_owned(), f64::from(ctx.inverter_quantity), "nos"),
        ("Module Mounting Structure", ctx.installation.to_owned(), (ctx.capacity_kwp * 7.0).ceil(), "m²"),
        ("DC Cables (String)", "4mm² Solar DC Cable".into(), (f64::from(ctx.module_count) * 3.0).ceil(), "m"),
        (
            "DC Cables (Main)",
            format!("{}mm² DC Cable", if large { 16 } else { 10 }),
            (ctx.capacity_kwp * 2.0).ceil(),
            "m",
        ),
        ("AC Cables", format!("{}mm² 3C+E", if large { 70 } else { 25 }), 30.0, "m"),
        (
            "DC Combiner Box",
            format!("{} String Input", strings.min(COMBINER_INPUTS)),
            f64::from(strings.div_ceil(COMBINER_INPUTS)),
            "nos",
        ),
        ("AC Distribution Board", format!("{acdb_rating}A rated"), 1.0, "nos"),
        ("Earthing System", "GI/Cu as per design".into(), 1.0, "set"),
        ("Lightning Arrester", "Class II SPD".into(), f64::from(ctx.inverter_quantity + 1), "nos"),
        ("Energy Meter", "Bi-directional Net Meter".into(), 1.0, "nos"),
        ("Monitoring System", "WiFi/LAN enabled".into(), 1.0, "set"),
    ];

    items
        .into_iter()
        .enumerate()
        .map(|(index, (item, specification, quantity, unit))| {
            row([
                ("sno", (index as u32 + 1).into()),
                ("item", item.into()),
                ("specification", specification.into()),
                ("quantity", quantity.into()),
                ("unit", unit.into()),
            ])
        })
        .collect()
}

fn catalog_from(inputs: &InputBag, manufacturer: &str) -> Vec<InverterModel> {
    match inputs.sequence("inverter_catalog_kw") {
        Some(capacities) if !capacities.is_empty() => capacities
            .iter()
            .map(|kw| InverterModel {
                manufacturer: manufacturer.to_owned(),
                model: format!("{kw}kW"),
                ac_capacity_kw: *kw,
            })
            .collect(),
        _ => DEFAULT_INVERTER_CATALOG.clone(),
    }
}

impl Calculator for PvSizing {
    fn config(&self) -> &'static CalculatorConfig {
        &CONFIG
    }

    fn compute(&self, inputs: &InputBag, out: &mut ResultBuilder) -> Result<()> {
        let daily_consumption = inputs.number_or("daily_consumption_kwh", 0.0);
        let available_area = inputs.number_or("available_area_m2", 0.0);
        let daily_yield = inputs.number_or("daily_solar_yield", DEFAULT_DAILY_YIELD);
        let performance_ratio = inputs.fraction_or("performance_ratio_percent", 80.0);
        let gcr = inputs.number_or("ground_coverage_ratio", DEFAULT_GROUND_COVERAGE_RATIO);
        let shading = ShadingCondition::parse(inputs.text_or("shading", "shade_free"))?;
        let installation_code = inputs.number_or("installation_type", 1.0).round() as usize;
        let installation = INSTALLATION_TYPES[installation_code.min(INSTALLATION_TYPES.len() - 1)];
        let ac_voltage = inputs.number_or("system_ac_voltage", DEFAULT_AC_VOLTAGE);
        let latitude = inputs.number("latitude");

        let panel = PanelModel {
            manufacturer: inputs.text_or("panel_manufacturer", "Generic").to_owned(),
            model: inputs.text_or("panel_model", "Mono PERC").to_owned(),
            rated_power_w: inputs.number_or("module_wattage_w", DEFAULT_MODULE_WATTAGE_W),
            area_m2: inputs.number("module_area_m2"),
            length_mm: inputs.number("module_length_mm"),
            width_mm: inputs.number("module_width_mm"),
            efficiency: None,
        };
        let module_area = panel.area_m2();
        let wattage = panel.rated_power_w;

        let tilt = match (inputs.number("tilt_deg"), latitude) {
            (Some(tilt), _) => tilt,
            (None, Some(lat)) => default_tilt(lat),
            (None, None) => 25.0,
        };
        let azimuth = inputs
            .number("azimuth_deg")
            .unwrap_or_else(|| default_azimuth(latitude.unwrap_or(0.0)));
        if inputs.number("tilt_deg").is_none() {
            match latitude {
                Some(lat) if lat.abs() <= 25.0 => {
                    out.step(format!("Tilt Angle = |{lat}°| - 2° = {}°", fixed(tilt, 1)))
                }
                _ => out.step(format!("Tilt Angle = 25° (fixed) = {}°", fixed(tilt, 1))),
            };
        }
        out.step(format!(
            "Azimuth = {}",
            if azimuth == 180.0 {
                "180° (South-facing)".to_owned()
            } else if azimuth == 0.0 {
                "0° (North-facing)".to_owned()
            } else {
                format!("{azimuth}° (user supplied)")
            }
        ));

        let system_losses = shading.system_losses_percent();
        out.step(format!("System Loss = {system_losses}% ({})", shading.label()));

        let consumption_kwp = consumption_based_capacity(daily_consumption, daily_yield, performance_ratio);
        let space_kwp = space_based_capacity(available_area, gcr, module_area, wattage);
        let reconciled = reconcile_capacity(consumption_kwp, space_kwp);
        out.step(format!(
            "PV_wp1 = {daily_consumption} / ({daily_yield} × {}) = {} kWp",
            fixed(performance_ratio, 2),
            fixed(consumption_kwp, 2)
        ))
        .step(format!(
            "PV_wp2 = ({available_area} × {gcr} / {}) × {} = {} kWp",
            fixed(module_area, 3),
            wattage / 1000.0,
            fixed(space_kwp, 2)
        ))
        .step(format!(
            "Final Capacity = MIN({}, {}) = {} kWp",
            fixed(consumption_kwp, 2),
            fixed(space_kwp, 2),
            fixed(reconciled.final_kwp, 2)
        ));

        let modules = module_count(reconciled.final_kwp, wattage);
        let realized = realized_capacity(modules, wattage);
        out.step(format!(
            "Number of Modules = ⌈{} × 1000 / {wattage}⌉ = {modules} pcs",
            fixed(reconciled.final_kwp, 3)
        ))
        .step(format!(
            "Actual Capacity = {modules} × {wattage} / 1000 = {} kWp",
            fixed(realized, 2)
        ));

        out.output("consumption_based_kwp", consumption_kwp)
            .output("space_based_kwp", space_kwp)
            .output("final_capacity_kwp", reconciled.final_kwp)
            .output("space_constrained", reconciled.space_constrained)
            .output("module_count", modules)
            .output("module_wattage_w", wattage)
            .output("realized_capacity_kwp", realized)
            .output("tilt_deg", tilt)
            .output("azimuth_deg", azimuth)
            .output("system_losses_percent", system_losses)
            .output("shading_loss_percent", shading.shading_loss_percent())
            .output("installation_type", installation);

        out.assume(format!("Performance Ratio: {}%", fixed(performance_ratio * 100.0, 0)))
            .assume(format!("Ground Coverage Ratio: {gcr}"))
            .assume(format!("Module Wattage: {wattage}Wp"))
            .assume(format!("Module Area: {} m²", fixed(module_area, 3)))
            .assume(format!("Daily Solar Yield: {daily_yield} kWh/kWp/day"));

        if reconciled.space_constrained {
            out.warn(format!(
                "Space-constrained design: Consumption-based capacity ({} kWp) exceeds space-based limit ({} kWp)",
                fixed(consumption_kwp, 2),
                fixed(space_kwp, 2)
            ));
        }

        let inverter_manufacturer = inputs.text_or("inverter_manufacturer", "Generic");
        let catalog = catalog_from(inputs, inverter_manufacturer);
        let constraints = SelectionConstraints {
            ratio_min: inputs.number_or("dc_ac_ratio_min", 0.9),
            ratio_max: inputs.number_or("dc_ac_ratio_max", 1.25),
            ratio_preferred: inputs.number_or("dc_ac_ratio_preferred", 1.0),
            ..SelectionConstraints::default()
        };
        let selection = select_inverter(realized, &catalog, &constraints)?;
        out.step(format!(
            "Selected: {}× {} ({} kW each)",
            selection.quantity, selection.inverter.model, selection.inverter.ac_capacity_kw
        ))
        .step(format!("Total AC Capacity = {} kW", selection.total_ac_kw))
        .step(format!(
            "DC/AC Ratio = {} / {} = {}",
            fixed(realized, 2),
            selection.total_ac_kw,
            fixed(selection.dc_ac_ratio, 3)
        ));
        out.output("inverter_model", selection.inverter.model.as_str())
            .output("inverter_quantity", selection.quantity)
            .output("inverter_unit_kw", selection.inverter.ac_capacity_kw)
            .output("total_ac_capacity_kw", selection.total_ac_kw)
            .output("dc_ac_ratio", selection.dc_ac_ratio);
        if selection.below_preferred(&constraints) {
            out.warn(format!(
                "DC/AC ratio ({}) is below {}. Consider higher capacity inverter.",
                fixed(selection.dc_ac_ratio, 3),
                constraints.ratio_preferred
            ));
        }

        let losses = system_losses / 100.0;
        let production = annual_production(realized, daily_yield, performance_ratio, losses);
        let yield_per_kwp = specific_yield(production, realized);
        let capacity_factor = capacity_factor_percent(production, realized);
        let area_needed = required_area(modules, module_area, gcr);
        out.step(format!(
            "Annual Production = {} × {daily_yield} × 365 × {} × (1 − {}) = {} kWh",
            fixed(realized, 2),
            fixed(performance_ratio, 2),
            fixed(losses, 3),
            fixed(production, 0)
        ))
        .step(format!(
            "Specific Yield = {} / {} = {} kWh/kWp",
            fixed(production, 0),
            fixed(realized, 2),
            fixed(yield_per_kwp, 0)
        ))
        .step(format!(
            "Capacity Factor = {} / ({} × 8760) × 100 = {}%",
            fixed(production, 0),
            fixed(realized, 2),
            fixed(capacity_factor, 1)
        ))
        .step(format!(
            "Required Area = {modules} × {} / {gcr} = {} m²",
            fixed(module_area, 3),
            fixed(area_needed, 1)
        ));

        out.output("annual_production_kwh", production)
            .output("specific_yield_kwh_per_kwp", yield_per_kwp)
            .output("capacity_factor_percent", capacity_factor)
            .output("performance_ratio_percent", performance_ratio * 100.0)
            .output("required_area_m2", area_needed)
            .output("available_area_m2", available_area);

        let items = installation_items(&MaterialsContext {
            panel: &panel,
            module_count: modules,
            inverter: &selection.inverter,
            inverter_quantity: selection.quantity,
            installation,
            capacity_kwp: realized,
            ac_voltage,
        });
        out.output("installation_items", items);

        out.insight(format!(
            "System capacity of {} kWp requires {modules} modules of {wattage}Wp",
            fixed(realized, 2)
        ))
        .insight(format!(
            "Estimated annual production: {} kWh ({} kWh/kWp)",
            fixed(production, 0),
            fixed(yield_per_kwp, 0)
        ))
        .insight(if reconciled.space_constrained {
            format!(
                "Due to space constraint ({available_area} m²), maximum capacity is {} kWp",
                fixed(space_kwp, 2)
            )
        } else {
            format!("Available space ({available_area} m²) is sufficient for the design capacity")
        });
        Ok(())
    }
}
