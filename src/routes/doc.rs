use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{
            AccessTokenResponse, AuthResponse, LoginRequest, LogoutRequest, RefreshRequest,
            RegisterRequest,
        },
        cart::{
            CartDto, CartItemInput, CartLine, RemoveCartItemRequest, ReplaceCartRequest,
            UpdateCartItemRequest,
        },
        categories::{CategoryList, CreateCategoryRequest, UpdateCategoryRequest},
        orders::{
            CreateOrderRequest, OrderDto, OrderItemInput, OrderLine, OrderList, ProductRef,
            UpdateOrderRequest, UserSummary,
        },
        products::{
            CategoryRef, CreateProductRequest, ProductCard, ProductList, UpdateProductRequest,
        },
        reviews::{CreateReviewRequest, ReviewList, UpdateReviewRequest},
        users::{FavoriteProductList, UpdateProfileRequest, UserList},
    },
    models::{
        Category, OrderStatus, OverviewRow, OverviewSection, PaymentMethod, PaymentStatus,
        Product, ProductSummary, Review, ShippingMethod, UserPublic, UserRole,
    },
    response::{ApiResponse, PageMeta},
    routes::{auth, cart, categories, health, orders, products, reviews, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::refresh,
        auth::logout,
        users::list_users,
        users::search_users,
        users::get_me,
        users::update_me,
        users::delete_me,
        users::list_favorites,
        users::add_favorite,
        users::remove_favorite,
        products::list_products,
        products::search_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        categories::list_categories,
        categories::search_categories,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        cart::get_cart,
        cart::create_cart,
        cart::update_cart,
        cart::add_item,
        cart::update_item_quantity,
        cart::remove_item,
        cart::clear_cart,
        cart::delete_cart,
        orders::list_orders,
        orders::search_orders,
        orders::list_my_orders,
        orders::get_order,
        orders::create_order,
        orders::update_order,
        orders::delete_order,
        reviews::list_reviews,
        reviews::list_by_product,
        reviews::create_review,
        reviews::update_review,
        reviews::delete_review,
    ),
    components(
        schemas(
            UserPublic,
            UserRole,
            Category,
            Product,
            ProductSummary,
            Review,
            OverviewRow,
            OverviewSection,
            PaymentMethod,
            PaymentStatus,
            OrderStatus,
            ShippingMethod,
            RegisterRequest,
            LoginRequest,
            RefreshRequest,
            LogoutRequest,
            AuthResponse,
            AccessTokenResponse,
            UpdateProfileRequest,
            UserList,
            FavoriteProductList,
            CreateCategoryRequest,
            UpdateCategoryRequest,
            CategoryList,
            CreateProductRequest,
            UpdateProductRequest,
            CategoryRef,
            ProductCard,
            ProductList,
            CartItemInput,
            ReplaceCartRequest,
            UpdateCartItemRequest,
            RemoveCartItemRequest,
            CartLine,
            CartDto,
            OrderItemInput,
            CreateOrderRequest,
            UpdateOrderRequest,
            ProductRef,
            UserSummary,
            OrderLine,
            OrderDto,
            OrderList,
            CreateReviewRequest,
            UpdateReviewRequest,
            ReviewList,
            PageMeta,
            ApiResponse<UserPublic>,
            ApiResponse<AuthResponse>,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartDto>,
            ApiResponse<OrderDto>,
            ApiResponse<OrderList>,
            ApiResponse<ReviewList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Users", description = "User profile and favorites"),
        (name = "Products", description = "Product catalog"),
        (name = "Categories", description = "Product categories"),
        (name = "Cart", description = "Per-user shopping cart"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Reviews", description = "Product reviews"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
